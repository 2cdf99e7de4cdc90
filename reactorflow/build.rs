fn main() {
    // Prevent warnings when checking for flag `reactorflow_loom`.
    println!("cargo::rustc-check-cfg=cfg(reactorflow_loom)");
}
