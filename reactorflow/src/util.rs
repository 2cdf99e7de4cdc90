pub(crate) mod index_list;
pub(crate) mod priority_queue;
