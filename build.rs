fn main() {
    // The Tauri context (tauri.conf.json, capabilities) is only compiled into
    // the desktop shell; the library core builds without it.
    #[cfg(feature = "desktop")]
    tauri_build::build()
}
