//! UniFFI bindings crate for the feeds library
//!
//! Library-mode wrapper around the feeds crate: it re-exports the FFI
//! module and the UniFFI scaffolding so one dylib carries everything.
//!
//! ## Building for Swift
//!
//! 1. Build the library for Apple platforms:
//!    ```bash
//!    cargo build --release -p feeds-ffi --target aarch64-apple-darwin
//!    cargo build --release -p feeds-ffi --target aarch64-apple-ios
//!    ```
//!
//! 2. Generate Swift bindings:
//!    ```bash
//!    cargo run -p feeds-ffi --features bindgen --bin uniffi-bindgen generate \
//!        --library target/aarch64-apple-darwin/release/libfeeds_ffi.dylib \
//!        --language swift \
//!        --out-dir generated/swift
//!    ```
//!
//! Kotlin works the same way with `--language kotlin` against the Android `.so`.

pub use feeds::ffi::*;

// Library mode needs the scaffolding symbols in this crate
feeds::uniffi_reexport_scaffolding!();
