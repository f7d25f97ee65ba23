//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

//! Assembler for the Z8, an 8-bit CPU with four word registers whose first
//! two split into byte halves.
//!
//! Every mnemonic lives in one sorted table ([`table::INSTRUCTIONS`]). Each
//! entry can [`assemble`](table::InstructionDescriptor::assemble) itself from
//! source text or [`encode`](table::InstructionDescriptor::encode) an operand
//! record another stage already built; [`table::synthesize`] is the by-name
//! form of the latter.

pub mod assembler;
pub mod config;
mod encode;
pub mod error;
pub mod expr;
pub mod mode;
pub mod operand;
pub mod output;
pub mod register;
pub mod scanner;
pub mod table;

pub use assembler::{assemble, Assembler};
pub use config::{Config, IndirectStyle};
pub use encode::BRANCH_LEN;
pub use error::{AssembleError, Diagnostic, EncodeError};
pub use mode::{AddressingMode, ModeSet};
pub use operand::{Operand, ResolvedOperand};
pub use output::{Address, CodeBuffer, Emit, Program};
pub use table::{lookup, synthesize};
