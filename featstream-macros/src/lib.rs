use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

mod module_meta;
use module_meta::{module_id, parse_module_info};

/// Registers a module type with the crate-wide module registry.
///
/// The struct must implement `Default` and `Module`. The generated code
/// implements `Registered` (exposing the registry id) and submits a
/// metadata factory to `inventory`.
#[proc_macro_derive(StreamModule, attributes(module_meta))]
pub fn derive_stream_module(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let module_info = match parse_module_info(&input) {
        Ok(info) => info,
        Err(e) => return e.write_errors().into(),
    };

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(&input.generics, "StreamModule cannot be derived for generic types")
            .to_compile_error()
            .into();
    }

    let struct_name = &input.ident;
    let id = module_id(&input, &module_info);
    let display_name = &module_info.name;
    let category = &module_info.category;
    let lower = struct_name.to_string().to_lowercase();

    let mod_name = syn::Ident::new(&format!("__module_registration_{}", lower), struct_name.span());
    let factory_fn_name = syn::Ident::new(&format!("create_metadata_{}", lower), struct_name.span());

    let expanded = quote! {
        impl crate::registry::Registered for #struct_name {
            const ID: &'static str = #id;
        }

        mod #mod_name {
            use super::*;

            fn #factory_fn_name() -> crate::registry::ModuleMetadata {
                crate::registry::ModuleMetadata {
                    id: #id.to_string(),
                    name: #display_name.to_string(),
                    category: #category.to_string(),
                    factory: || Box::new(#struct_name::default()),
                }
            }

            ::inventory::submit! {
                crate::registry::ModuleMetadataFactoryWrapper(#factory_fn_name)
            }
        }
    };

    TokenStream::from(expanded)
}
