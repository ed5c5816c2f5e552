// This file is part of icapd, an application to stream partial bitstreams into Xilinx FPGA configuration ports.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// icapd is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// icapd is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

//! Procedural macros for icapd.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{ItemStruct, LitStr, parse_macro_input};

/// Register a configuration port variant under a device-tree style compatible string.
///
/// The annotated struct must implement `icapd::variants::IcapVariant` and provide
/// `fn bind(resources: DeviceResources) -> Result<Self, IcapdError>`. The macro adds a
/// `COMPAT_STRING` constant and a `register_variant()` function that inserts a
/// constructor into the variant registry.
///
/// ```rust,ignore
/// #[variant(compat_string = "xlnx,hbicap-fpga")]
/// pub struct HbicapVariant { /* ... */ }
///
/// HbicapVariant::register_variant();
/// ```
#[proc_macro_attribute]
pub fn variant(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut compat_string: Option<LitStr> = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("compat_string") {
            compat_string = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported variant property"))
        }
    });
    parse_macro_input!(attr with parser);
    let item = parse_macro_input!(item as ItemStruct);

    let Some(compat) = compat_string else {
        return syn::Error::new(Span::call_site(), "expected `compat_string = \"...\"`")
            .to_compile_error()
            .into();
    };
    let name = &item.ident;
    let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();

    quote! {
        #item

        impl #impl_generics #name #ty_generics #where_clause {
            pub const COMPAT_STRING: &'static str = #compat;

            pub fn register_variant() {
                crate::variants::register_variant(#compat, |resources| {
                    let variant: Box<dyn crate::variants::IcapVariant> =
                        Box::new(#name::bind(resources)?);
                    Ok(variant)
                });
            }
        }
    }
    .into()
}
