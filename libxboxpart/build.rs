fn main() {
    let pointer_width = std::env::var("CARGO_CFG_TARGET_POINTER_WIDTH")
        .expect("Failed to read target pointer width");

    if pointer_width == "32" {
        panic!("libxboxpart does not support 32-bit targets, partition offsets exceed 4 GiB");
    }
}
