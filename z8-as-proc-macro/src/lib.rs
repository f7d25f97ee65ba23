//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use std::collections::HashSet;

use proc_macro2::Ident;
use quote::quote;
use syn::{
	parse::{Parse, ParseStream},
	parse_macro_input,
	punctuated::Punctuated,
	LitInt, Token,
};

const MAX_MNEMONIC_LEN: usize = 4;

struct Entry {
	mnemonic: Ident,
	modes: Vec<Ident>,
	base: u8,
	extension: u8,
	family: Ident,
}

struct Table {
	entries: Vec<Entry>,
}

impl Parse for Entry {
	fn parse(input: ParseStream) -> syn::Result<Self> {
		let mnemonic: Ident = input.parse()?;
		let name = mnemonic.to_string();

		if name.is_empty()
			|| name.len() > MAX_MNEMONIC_LEN
			|| !name.chars().all(|char| char.is_ascii_uppercase())
		{
			return Err(syn::Error::new(
				mnemonic.span(),
				format!(
					"Mnemonics must be 1 to {} uppercase ASCII letters",
					MAX_MNEMONIC_LEN
				),
			));
		}

		input.parse::<Token![:]>()?;

		let mut seen = HashSet::new();
		let mut modes = Vec::new();
		for mode in Punctuated::<Ident, Token![|]>::parse_separated_nonempty(input)? {
			if !seen.insert(mode.to_string()) {
				return Err(syn::Error::new(
					mode.span(),
					format!("Addressing mode \"{}\" is listed twice", mode),
				));
			}
			modes.push(mode);
		}

		input.parse::<Token![,]>()?;
		let base = input.parse::<LitInt>()?.base10_parse::<u8>()?;
		input.parse::<Token![,]>()?;
		let extension = input.parse::<LitInt>()?.base10_parse::<u8>()?;
		input.parse::<Token![=>]>()?;
		let family: Ident = input.parse()?;
		input.parse::<Token![;]>()?;

		Ok(Self {
			mnemonic,
			modes,
			base,
			extension,
			family,
		})
	}
}

impl Parse for Table {
	fn parse(input: ParseStream) -> syn::Result<Self> {
		let mut entries: Vec<Entry> = Vec::new();

		while !input.is_empty() {
			let entry: Entry = input.parse()?;

			if let Some(previous) = entries.last() {
				if previous.mnemonic.to_string() >= entry.mnemonic.to_string() {
					return Err(syn::Error::new(
						entry.mnemonic.span(),
						format!(
							"\"{}\" must come after \"{}\"",
							entry.mnemonic, previous.mnemonic
						),
					));
				}
			}

			entries.push(entry);
		}

		if entries.is_empty() {
			return Err(input.error("Expected at least one instruction"));
		}

		Ok(Self { entries })
	}
}

/// Builds the static, mnemonic-sorted `INSTRUCTIONS` table.
///
/// Each entry reads `MNEMONIC: Mode | Mode, base, extension => Family;`.
/// Entries must be strictly ascending, which is checked here so lookups can
/// rely on it. `InstructionDescriptor`, `ModeSet`, `AddressingMode` and
/// `Family` must be in scope at the call site.
#[proc_macro]
pub fn instruction_table(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let table = parse_macro_input!(item as Table);
	let count = table.entries.len();

	let entries = table.entries.iter().map(|entry| {
		let mnemonic = entry.mnemonic.to_string();
		let modes = &entry.modes;
		let base = entry.base;
		let extension = entry.extension;
		let family = &entry.family;

		quote! {
			InstructionDescriptor {
				mnemonic: #mnemonic,
				modes: ModeSet::from_modes(&[#(AddressingMode::#modes),*]),
				base: #base,
				extension: #extension,
				family: Family::#family,
			}
		}
	});

	quote! {
		pub static INSTRUCTIONS: [InstructionDescriptor; #count] = [#(#entries),*];
	}
	.into()
}
