//! Procedural macros for cacheit.
//!
//! `#[cacheable(...)]` implements `cacheit::CacheableSource` for a struct from
//! a declarative list of tags, contexts and a max-age.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, punctuated::Punctuated, Expr, Fields, ItemStruct, Lit, MetaNameValue,
    Token, UnOp,
};

/// Parsed `#[cacheable]` attributes
struct CacheableAttributes {
    tags: Vec<syn::LitStr>,
    contexts: Vec<syn::LitStr>,
    max_age: TokenStream2,
}

impl Default for CacheableAttributes {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            contexts: Vec::new(),
            max_age: quote! { ::cacheit::MaxAge::Permanent },
        }
    }
}

/// Parse `["a", "b"]` into its string literals
fn parse_string_list(nv: &MetaNameValue, attr: &str) -> Result<Vec<syn::LitStr>, TokenStream2> {
    let invalid = || {
        let msg = format!(
            "Invalid syntax for `{}`: expected `{} = [\"...\", ...]`",
            attr, attr
        );
        quote! { compile_error!(#msg) }
    };

    match &nv.value {
        Expr::Array(array) => array
            .elems
            .iter()
            .map(|elem| match elem {
                Expr::Lit(expr_lit) => match &expr_lit.lit {
                    Lit::Str(s) => Ok(s.clone()),
                    _ => Err(invalid()),
                },
                _ => Err(invalid()),
            })
            .collect(),
        _ => Err(invalid()),
    }
}

/// Parse `max_age = -1 | 0 | <seconds>`
fn parse_max_age_attribute(nv: &MetaNameValue) -> Result<TokenStream2, TokenStream2> {
    let seconds: i64 = match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Int(lit_int) => lit_int.base10_parse::<i64>().map_err(|_| {
                quote! { compile_error!("`max_age` must fit in a 64-bit integer") }
            })?,
            _ => {
                return Err(
                    quote! { compile_error!("Invalid literal for `max_age`: expected integer (seconds)") },
                )
            }
        },
        Expr::Unary(unary) if matches!(unary.op, UnOp::Neg(_)) => match &*unary.expr {
            Expr::Lit(expr_lit) => match &expr_lit.lit {
                Lit::Int(lit_int) => -lit_int.base10_parse::<i64>().map_err(|_| {
                    quote! { compile_error!("`max_age` must fit in a 64-bit integer") }
                })?,
                _ => {
                    return Err(
                        quote! { compile_error!("Invalid literal for `max_age`: expected integer (seconds)") },
                    )
                }
            },
            _ => {
                return Err(
                    quote! { compile_error!("Invalid syntax for `max_age`: expected `max_age = <integer>`") },
                )
            }
        },
        _ => {
            return Err(
                quote! { compile_error!("Invalid syntax for `max_age`: expected `max_age = <integer>`") },
            )
        }
    };

    match seconds {
        -1 => Ok(quote! { ::cacheit::MaxAge::Permanent }),
        n if n >= 0 => {
            let n = n as u64;
            Ok(quote! { ::cacheit::MaxAge::Seconds(#n) })
        }
        _ => Err(
            quote! { compile_error!("Invalid `max_age`: expected -1 (permanent) or a non-negative number of seconds") },
        ),
    }
}

fn parse_attributes(attr: TokenStream2) -> Result<CacheableAttributes, TokenStream2> {
    use syn::parse::Parser;

    let parser = Punctuated::<MetaNameValue, Token![,]>::parse_terminated;
    let parsed_args = parser.parse2(attr).map_err(|e| {
        let msg = format!("Failed to parse attributes: {}", e);
        quote! { compile_error!(#msg) }
    })?;

    let mut attrs = CacheableAttributes::default();

    for nv in parsed_args {
        if nv.path.is_ident("tags") {
            attrs.tags = parse_string_list(&nv, "tags")?;
        } else if nv.path.is_ident("contexts") {
            attrs.contexts = parse_string_list(&nv, "contexts")?;
        } else if nv.path.is_ident("max_age") {
            attrs.max_age = parse_max_age_attribute(&nv)?;
        } else {
            return Err(
                quote! { compile_error!("Unknown attribute: expected `tags`, `contexts` or `max_age`") },
            );
        }
    }

    Ok(attrs)
}

/// A procedural macro that implements `CacheableSource` for a struct.
///
/// # Attributes
///
/// - `tags = ["...", ...]` - Cache tags. On structs with named fields each is
///   a `format!` string evaluated with the fields in scope, so `"node:{id}"`
///   tags a node by its `id` field. Tuple and unit structs take them verbatim.
/// - `contexts = ["...", ...]` - Request contexts the data varies by
/// - `max_age = N` - Lifetime in seconds; `0` forbids caching, `-1`
///   (the default) means permanent
///
/// # Examples
///
/// ```ignore
/// use cacheit::{cacheable, CacheableSource, MaxAge};
///
/// #[cacheable(tags = ["node:{id}"], contexts = ["languages"], max_age = 3600)]
/// struct Node {
///     id: u64,
///     title: String,
/// }
///
/// let meta = Node { id: 2, title: "Conditions".into() }.cache_metadata().unwrap();
/// assert!(meta.has_tag("node:2"));
/// assert_eq!(meta.max_age(), MaxAge::Seconds(3600));
/// ```
#[proc_macro_attribute]
pub fn cacheable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match parse_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };
    let input = parse_macro_input!(item as ItemStruct);

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Bind named fields so tag templates can refer to them directly
    let (bindings, tags): (TokenStream2, Vec<TokenStream2>) = match &input.fields {
        Fields::Named(named) => {
            let names = named.named.iter().filter_map(|f| f.ident.as_ref());
            (
                quote! {
                    #[allow(unused_variables)]
                    let Self { #(#names,)* .. } = self;
                },
                attrs
                    .tags
                    .iter()
                    .map(|tag| quote! { ::std::format!(#tag) })
                    .collect(),
            )
        }
        Fields::Unnamed(_) | Fields::Unit => (
            quote! {},
            attrs
                .tags
                .iter()
                .map(|tag| quote! { ::std::string::String::from(#tag) })
                .collect(),
        ),
    };

    let contexts = &attrs.contexts;
    let max_age = &attrs.max_age;

    let expanded = quote! {
        #input

        impl #impl_generics ::cacheit::CacheableSource for #ident #ty_generics #where_clause {
            fn cache_metadata(
                &self,
            ) -> ::core::result::Result<::cacheit::CacheMetadata, ::cacheit::SourceUnavailable> {
                #bindings
                let __metadata = ::cacheit::CacheMetadata::new()
                    #( .add_tag(#tags) )*
                    #( .with_contexts([#contexts]) )*
                    .with_max_age(#max_age);
                ::core::result::Result::Ok(__metadata)
            }
        }
    };

    TokenStream::from(expanded)
}
