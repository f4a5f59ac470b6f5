//! Manual entry path.
//!
//! A handheld scanner is a keyboard: it types the code into a focused text
//! field in one burst and finishes with Enter. This crate turns that
//! keystroke stream into the same gate → lookup → dispatch contract the
//! camera path uses, with no camera access anywhere near it. It works
//! alongside an open camera session but shares nothing with one.

mod buffer;
mod lane;

pub use buffer::{EntryBuffer, Key};
pub use lane::ManualLane;
