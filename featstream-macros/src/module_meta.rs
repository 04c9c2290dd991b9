use darling::FromAttributes;
use syn::DeriveInput;

/// Parsed attributes from #[module_meta(...)]
#[derive(Debug, FromAttributes)]
#[darling(attributes(module_meta))]
pub struct ModuleMetaArgs {
    pub name: String,
    pub category: String,

    /// Registry id, defaults to the lowercased struct name
    #[darling(default)]
    pub id: Option<String>,
}

pub fn parse_module_info(input: &DeriveInput) -> darling::Result<ModuleMetaArgs> {
    ModuleMetaArgs::from_attributes(&input.attrs)
}

/// Registry id for a module type
pub fn module_id(input: &DeriveInput, args: &ModuleMetaArgs) -> String {
    args.id
        .clone()
        .unwrap_or_else(|| input.ident.to_string().to_lowercase())
}
