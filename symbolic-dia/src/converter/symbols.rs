use std::convert::TryFrom;

use object::{Object, ObjectSymbol, SymbolKind};
use thiserror::Error;

use super::*;
use crate::ErrorSink;

/// Errors than can happen while processing the symbols of an object file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProcessError {
    /// The symbol name could not be read.
    #[error("invalid name for symbol at {address:#x}")]
    BadSymbolName {
        /// Address of the symbol.
        address: u64,
        /// The error returned by the object parser.
        #[source]
        source: object::Error,
    },
    /// The symbol is larger than a range can describe.
    #[error("symbol `{name}` at {address:#x} is too large ({size} bytes)")]
    SymbolTooLarge {
        /// Name of the symbol.
        name: String,
        /// Address of the symbol.
        address: u64,
        /// Size of the symbol.
        size: u64,
    },
}

impl Converter {
    /// Adds a depth-0 range for every defined function symbol in the object's symbol table.
    ///
    /// Symbols without a name or size are skipped. Symbols that cannot be represented are
    /// skipped as well, and reported to the [`ErrorSink`]. Returns the number of ranges added.
    pub fn process_object<'data, O, E>(&mut self, object: &O, mut error_sink: E) -> usize
    where
        O: Object<'data>,
        E: ErrorSink<ProcessError>,
    {
        let mut added = 0;
        for symbol in object.symbols() {
            if symbol.kind() != SymbolKind::Text || !symbol.is_definition() || symbol.size() == 0
            {
                continue;
            }

            let address = symbol.address();
            let name = match symbol.name() {
                Ok("") => continue,
                Ok(name) => name,
                Err(source) => {
                    error_sink.raise_error(ProcessError::BadSymbolName { address, source });
                    continue;
                }
            };
            let length = match u32::try_from(symbol.size()) {
                Ok(length) => length,
                Err(_) => {
                    error_sink.raise_error(ProcessError::SymbolTooLarge {
                        name: name.to_owned(),
                        address,
                        size: symbol.size(),
                    });
                    continue;
                }
            };

            self.visit(&Range::new(address, length, name));
            added += 1;
        }

        log::debug!("added {} function symbols from object", added);
        added
    }
}
