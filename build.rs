// Embeds the application icon and version metadata into the Windows executable.

#[cfg(windows)]
fn main() {
    use winres::WindowsResource;

    println!("cargo:rerun-if-changed=assets/icon.ico");

    WindowsResource::new()
        .set_icon("assets/icon.ico")
        .set("ProductName", "Image Resizer")
        .set("FileDescription", "Batch resize images to a target size")
        .set("LegalCopyright", "Copyright (C) 2024")
        .compile()
        .expect("failed to embed Windows resources");
}

#[cfg(not(windows))]
fn main() {
    // Nothing to do on non-Windows platforms
}
