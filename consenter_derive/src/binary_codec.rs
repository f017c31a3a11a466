//! Code generation for `#[derive(BinaryCodec)]`.
//!
//! Fields are written in declaration order with no padding or field tags.
//! Enums are prefixed with a one-byte variant tag equal to the variant's
//! position in the declaration (0, 1, 2, ...). Explicit discriminants are
//! rejected so the tag of a variant can only change by reordering.
//!
//! The generated code refers to `crate::types::encoding`, so the derive can
//! only be used inside the `consenter` crate.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DeriveInput, Fields, Ident, parse_macro_input};

pub fn expand(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_input(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_input(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data) => struct_bodies(&data.fields),
        Data::Enum(data) => enum_bodies(data)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "BinaryCodec cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            fn decode(
                input: &mut &[u8],
            ) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}

/// Local bindings for a set of fields, plus the pattern that destructures them
/// and the constructor that rebuilds them.
struct FieldBindings {
    bindings: Vec<Ident>,
    pattern: TokenStream2,
    constructor: TokenStream2,
}

fn bind_fields(fields: &Fields) -> FieldBindings {
    match fields {
        Fields::Named(named) => {
            let names: Vec<&Ident> = named.named.iter().filter_map(|f| f.ident.as_ref()).collect();
            // Prefixed so a field called `input` or `out` cannot shadow the codec arguments.
            let bindings: Vec<Ident> = names.iter().map(|n| format_ident!("__{}", n)).collect();
            FieldBindings {
                pattern: quote! { { #(#names: #bindings),* } },
                constructor: quote! { { #(#names: #bindings),* } },
                bindings,
            }
        }
        Fields::Unnamed(unnamed) => {
            let names: Vec<Ident> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("__field_{}", i))
                .collect();
            FieldBindings {
                pattern: quote! { ( #(#names),* ) },
                constructor: quote! { ( #(#names),* ) },
                bindings: names,
            }
        }
        Fields::Unit => FieldBindings {
            bindings: Vec::new(),
            pattern: TokenStream2::new(),
            constructor: TokenStream2::new(),
        },
    }
}

fn encode_bindings(bindings: &[Ident]) -> TokenStream2 {
    quote! {
        #( crate::types::encoding::Encode::encode(#bindings, out); )*
    }
}

fn decode_bindings(bindings: &[Ident]) -> TokenStream2 {
    quote! {
        #( let #bindings = crate::types::encoding::Decode::decode(input)?; )*
    }
}

fn struct_bodies(fields: &Fields) -> (TokenStream2, TokenStream2) {
    let FieldBindings {
        bindings,
        pattern,
        constructor,
    } = bind_fields(fields);
    let encode = encode_bindings(&bindings);
    let decode = decode_bindings(&bindings);

    (
        quote! {
            let Self #pattern = self;
            #encode
        },
        quote! {
            #decode
            Ok(Self #constructor)
        },
    )
}

fn enum_bodies(data: &DataEnum) -> syn::Result<(TokenStream2, TokenStream2)> {
    if data.variants.len() > usize::from(u8::MAX) + 1 {
        return Err(syn::Error::new_spanned(
            &data.variants,
            "BinaryCodec supports at most 256 enum variants",
        ));
    }

    let mut encode_arms = Vec::with_capacity(data.variants.len());
    let mut decode_arms = Vec::with_capacity(data.variants.len());

    for (position, variant) in data.variants.iter().enumerate() {
        if let Some((_, expr)) = &variant.discriminant {
            return Err(syn::Error::new_spanned(
                expr,
                "BinaryCodec derives variant tags from declaration order",
            ));
        }

        // Bounded by the variant count check above.
        let tag = position as u8;
        let ident = &variant.ident;
        let FieldBindings {
            bindings,
            pattern,
            constructor,
        } = bind_fields(&variant.fields);
        let encode = encode_bindings(&bindings);
        let decode = decode_bindings(&bindings);

        encode_arms.push(quote! {
            Self::#ident #pattern => {
                crate::types::encoding::Encode::encode(&#tag, out);
                #encode
            }
        });
        decode_arms.push(quote! {
            #tag => {
                #decode
                Ok(Self::#ident #constructor)
            }
        });
    }

    Ok((
        quote! {
            match self {
                #(#encode_arms)*
            }
        },
        quote! {
            let tag: u8 = crate::types::encoding::Decode::decode(input)?;
            match tag {
                #(#decode_arms)*
                _ => Err(crate::types::encoding::DecodeError::InvalidValue),
            }
        },
    ))
}
