//! Derive macros for the consenter crate.
//!
//! Provides `#[derive(BinaryCodec)]`, which generates the `Encode` and `Decode`
//! implementations used by the wire schema.

mod binary_codec;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` for structs and enums.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::expand(input)
}
