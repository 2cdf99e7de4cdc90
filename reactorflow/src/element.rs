//! Element identifiers and naming.
//!
//! Every element of a reactor program (containers, ports, reactions and
//! actions) is stored in an arena owned by the
//! [`Environment`](crate::Environment) and addressed through a copyable id.
//! An element is created once at assembly time, is never reparented, and
//! keeps a non-owning back-reference to its container.

use std::fmt;

macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Returns the arena index of this element.
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(fmt, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

element_id!(
    /// Unique identifier of a container (reactor).
    ReactorId,
    "reactor"
);
element_id!(
    /// Unique identifier of a port.
    PortId,
    "port"
);
element_id!(
    /// Unique identifier of a reaction.
    ReactionId,
    "reaction"
);
element_id!(
    /// Unique identifier of a schedulable action.
    ///
    /// Action ids are allocated in declaration order, which makes them a
    /// deterministic tie-break between actions scheduled for the same tag.
    ActionId,
    "action"
);

/// Reference to any element of the program tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementRef {
    /// A container.
    Reactor(ReactorId),
    /// A port.
    Port(PortId),
    /// A reaction.
    Reaction(ReactionId),
    /// An action.
    Action(ActionId),
}

impl From<ReactorId> for ElementRef {
    fn from(id: ReactorId) -> Self {
        Self::Reactor(id)
    }
}

impl From<PortId> for ElementRef {
    fn from(id: PortId) -> Self {
        Self::Port(id)
    }
}

impl From<ReactionId> for ElementRef {
    fn from(id: ReactionId) -> Self {
        Self::Reaction(id)
    }
}

impl From<ActionId> for ElementRef {
    fn from(id: ActionId) -> Self {
        Self::Action(id)
    }
}

/// Name and owner of an element.
#[derive(Clone, Debug)]
pub(crate) struct ElementInfo {
    pub(crate) name: String,
    /// The owning container, `None` only for top-level containers.
    pub(crate) container: Option<ReactorId>,
}

impl ElementInfo {
    pub(crate) fn new(name: impl Into<String>, container: Option<ReactorId>) -> Self {
        Self {
            name: name.into(),
            container,
        }
    }
}

/// Separator between the names of nested elements in a fully-qualified name.
pub const FQN_SEPARATOR: char = '.';
