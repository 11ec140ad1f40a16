//! Web build support. Without a panic hook a WASM panic only aborts; this routes the message to
//! the browser console instead.

#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}
