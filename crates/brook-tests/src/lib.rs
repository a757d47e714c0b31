//! Cross-crate scenario and invariant tests live under `tests/`; this
//! crate has no runtime surface of its own.
