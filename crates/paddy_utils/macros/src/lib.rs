use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input, Ident, LitInt, Token,
};

/// 输入: `all_tuples!(macro_ident, start, end, prefix)`
struct AllTuples {
    macro_ident: Ident,
    start: usize,
    end: usize,
    prefix: Ident,
}

impl Parse for AllTuples {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let macro_ident = input.parse::<Ident>()?;
        input.parse::<Token![,]>()?;
        let start = input.parse::<LitInt>()?.base10_parse::<usize>()?;
        input.parse::<Token![,]>()?;
        let end = input.parse::<LitInt>()?.base10_parse::<usize>()?;
        input.parse::<Token![,]>()?;
        let prefix = input.parse::<Ident>()?;
        Ok(Self {
            macro_ident,
            start,
            end,
            prefix,
        })
    }
}

/// 对 `start..=end` 中的每个元组元数 `n`，调用一次 `macro_ident!(P0, P1, ..., P{n-1})`\
/// `Pi` 由 `prefix` 与下标拼接而成 (e.g. `B0, B1, B2`)
///
/// 用于为元组类型批量实现 trait (如 `Bundle`)，避免手写 16 份重复的 impl
#[proc_macro]
pub fn all_tuples(input: TokenStream) -> TokenStream {
    let AllTuples {
        macro_ident,
        start,
        end,
        prefix,
    } = parse_macro_input!(input as AllTuples);

    let mut invocations = Vec::with_capacity(end - start + 1);
    for arity in start..=end {
        let idents: Vec<Ident> = (0..arity)
            .map(|i| format_ident!("{}{}", prefix, i))
            .collect();
        invocations.push(quote! {
            #macro_ident!(#(#idents),*);
        });
    }

    quote! {
        #(#invocations)*
    }
    .into()
}
