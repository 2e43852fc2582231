//! Procedural macros shared across the `tilecask` workspace.
//!
//! Currently this only carries [`context`], an attribute macro that wraps a
//! function body and attaches formatted `anyhow` context to any error it
//! returns, without requiring the author to thread `.context(...)` through
//! every early return by hand.

mod args;

use args::Args;
use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::ToTokens;
use quote::quote;
use syn::parse_macro_input;

/// Attach formatted context to any error a function returns.
///
/// ```ignore
/// #[context("loading grid {name}")]
/// fn load_grid(name: &str) -> Result<Grid> { ... }
/// ```
///
/// Works on both sync and `async fn`. The format string is evaluated at the
/// point of failure, so it can reference the function's parameters and local
/// bindings.
#[proc_macro_attribute]
pub fn context(args: TokenStream, input: TokenStream) -> TokenStream {
	let Args(move_token, format_args) = parse_macro_input!(args);
	let mut input = parse_macro_input!(input as syn::ItemFn);

	let body = &input.block;
	let return_type = &input.sig.output;
	let err = Ident::new("err", Span::mixed_site());

	let new_body = if input.sig.asyncness.is_some() {
		let return_type = match return_type {
			syn::ReturnType::Default => {
				return syn::Error::new_spanned(input, "function should return Result")
					.to_compile_error()
					.into();
			}
			syn::ReturnType::Type(_, return_type) => return_type,
		};
		let result = Ident::new("result", Span::mixed_site());
		quote! {
			let #result: #return_type = async #move_token { #body }.await;
			#result.map_err(|#err| #err.context(format!(#format_args)).into())
		}
	} else {
		let force_fn_once = Ident::new("force_fn_once", Span::mixed_site());
		quote! {
			// Moving a non-`Copy` value into the closure forces the closure to be
			// treated as `FnOnce`, which avoids some spurious borrowck errors.
			let #force_fn_once = ::core::iter::empty::<()>();
			(#move_token || #return_type {
				::core::mem::drop(#force_fn_once);
				#body
			})().map_err(|#err| #err.context(format!(#format_args)).into())
		}
	};
	input.block.stmts = vec![syn::Stmt::Expr(syn::Expr::Verbatim(new_body), None)];

	input.into_token_stream().into()
}
