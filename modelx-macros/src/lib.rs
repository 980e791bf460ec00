//! Procedural macros for modelx

use darling::{FromDeriveInput, FromVariant};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, DeriveInput};

/// Container-level attributes for #[derive(ModelAction)]
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(action), supports(enum_any))]
struct ModelActionOpts {
    ident: syn::Ident,
    data: darling::ast::Data<ModelActionVariant, ()>,

    /// The namespace every variant dispatches under
    namespace: String,
}

/// Variant-level attributes
#[derive(Debug, FromVariant)]
#[darling(attributes(action))]
struct ModelActionVariant {
    ident: syn::Ident,
    fields: darling::ast::Fields<ActionField>,

    /// Explicit action name override (default: snake_case of the variant)
    #[darling(default)]
    rename: Option<String>,
}

#[derive(Debug, darling::FromField)]
struct ActionField {
    ident: Option<syn::Ident>,
}

/// Convert PascalCase to snake_case
fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

/// Derive `modelx::ModelAction` for a namespaced action enum.
///
/// Every variant dispatches as `namespace/snake_case_variant_name`; variant
/// fields become the JSON payload (a single tuple field as-is, multiple
/// tuple fields as an array, named fields as an object). A `TryFrom<&Action>`
/// impl is generated for decoding runtime actions back into the enum.
///
/// # Example
///
/// ```ignore
/// #[derive(ModelAction, Clone, Debug)]
/// #[action(namespace = "counter")]
/// enum CounterAction {
///     Increment,                 // "counter/increment"
///     Set(i64),                  // "counter/set", payload 42
///     Jump { by: i64 },          // "counter/jump", payload {"by": 3}
///     #[action(rename = "zero")]
///     Reset,                     // "counter/zero"
/// }
/// ```
#[proc_macro_derive(ModelAction, attributes(action))]
pub fn derive_model_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let opts = match ModelActionOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(err) => return err.write_errors().into(),
    };

    let name = &opts.ident;
    let namespace = &opts.namespace;
    let variants = match &opts.data {
        darling::ast::Data::Enum(variants) => variants,
        darling::ast::Data::Struct(_) => unreachable!("supports(enum_any)"),
    };

    let mut kind_arms = Vec::new();
    let mut payload_arms = Vec::new();
    let mut decode_arms = Vec::new();

    for variant in variants {
        let ident = &variant.ident;
        let action_name = variant
            .rename
            .clone()
            .unwrap_or_else(|| to_snake_case(&ident.to_string()));

        kind_arms.push(quote! {
            #name::#ident { .. } => modelx::ActionKind::new(#namespace, #action_name)
        });

        let (payload_arm, decode_arm) = variant_codecs(name, ident, &action_name, &variant.fields);
        payload_arms.push(payload_arm);
        decode_arms.push(decode_arm);
    }

    let expanded = quote! {
        impl modelx::ModelAction for #name {
            fn kind(&self) -> modelx::ActionKind {
                match self {
                    #(#kind_arms,)*
                }
            }

            fn payload(&self) -> ::core::option::Option<modelx::macro_support::Value> {
                match self {
                    #(#payload_arms,)*
                }
            }
        }

        impl ::core::convert::TryFrom<&modelx::Action> for #name {
            type Error = modelx::ActionDecodeError;

            fn try_from(action: &modelx::Action) -> ::core::result::Result<Self, Self::Error> {
                if action.kind().namespace() != #namespace {
                    return ::core::result::Result::Err(
                        modelx::ActionDecodeError::UnknownKind(action.kind().clone()),
                    );
                }
                let payload = action
                    .payload()
                    .cloned()
                    .unwrap_or(modelx::macro_support::Value::Null);
                match action.kind().name() {
                    #(#decode_arms,)*
                    _ => ::core::result::Result::Err(
                        modelx::ActionDecodeError::UnknownKind(action.kind().clone()),
                    ),
                }
            }
        }
    };

    expanded.into()
}

/// Build the payload-encoding and payload-decoding match arms for a variant.
fn variant_codecs(
    name: &syn::Ident,
    ident: &syn::Ident,
    action_name: &str,
    fields: &darling::ast::Fields<ActionField>,
) -> (TokenStream2, TokenStream2) {
    let payload_err = quote! {
        |source| modelx::ActionDecodeError::Payload {
            kind: action.kind().clone(),
            source,
        }
    };

    match fields.style {
        darling::ast::Style::Unit => (
            quote! { #name::#ident => ::core::option::Option::None },
            quote! {
                #action_name => ::core::result::Result::Ok(#name::#ident)
            },
        ),
        darling::ast::Style::Tuple => {
            let bindings: Vec<_> = (0..fields.fields.len())
                .map(|i| format_ident!("field{i}"))
                .collect();
            let payload_arm = if bindings.len() == 1 {
                let field = &bindings[0];
                quote! {
                    #name::#ident(#field) => modelx::macro_support::to_value(#field).ok()
                }
            } else {
                quote! {
                    #name::#ident(#(#bindings),*) =>
                        modelx::macro_support::to_value((#(#bindings),*)).ok()
                }
            };
            let decode_arm = if bindings.len() == 1 {
                quote! {
                    #action_name => {
                        let value = modelx::macro_support::from_value(payload)
                            .map_err(#payload_err)?;
                        ::core::result::Result::Ok(#name::#ident(value))
                    }
                }
            } else {
                quote! {
                    #action_name => {
                        let (#(#bindings),*) = modelx::macro_support::from_value(payload)
                            .map_err(#payload_err)?;
                        ::core::result::Result::Ok(#name::#ident(#(#bindings),*))
                    }
                }
            };
            (payload_arm, decode_arm)
        }
        darling::ast::Style::Struct => {
            let field_idents: Vec<_> = fields
                .fields
                .iter()
                .filter_map(|f| f.ident.clone())
                .collect();
            let field_names: Vec<_> = field_idents.iter().map(|f| f.to_string()).collect();
            let payload_arm = quote! {
                #name::#ident { #(#field_idents),* } => (|| {
                    let mut map = modelx::macro_support::Map::new();
                    #(
                        map.insert(
                            #field_names.to_string(),
                            modelx::macro_support::to_value(#field_idents).ok()?,
                        );
                    )*
                    ::core::option::Option::Some(modelx::macro_support::Value::Object(map))
                })()
            };
            let decode_arm = quote! {
                #action_name => {
                    let mut obj = match payload {
                        modelx::macro_support::Value::Object(obj) => obj,
                        _ => modelx::macro_support::Map::new(),
                    };
                    ::core::result::Result::Ok(#name::#ident {
                        #(
                            #field_idents: modelx::macro_support::from_value(
                                obj.remove(#field_names)
                                    .unwrap_or(modelx::macro_support::Value::Null),
                            )
                            .map_err(#payload_err)?,
                        )*
                    })
                }
            };
            (payload_arm, decode_arm)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::to_snake_case;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("Increment"), "increment");
        assert_eq!(to_snake_case("DidLoadData"), "did_load_data");
        assert_eq!(to_snake_case("Set"), "set");
    }
}
