//! COFF object parsing and function extraction.
//!
//! [`probe`] is the cheap pre-flight filter the archive pipeline runs on each
//! member payload; [`CoffObject`] is the full parse, and
//! [`CoffObject::code_functions`] derives the byte span of every function
//! symbol defined in a code section.

mod header;
mod section;
mod symbol;

pub use header::{
    FileHeader, IMAGE_FILE_MACHINE_AMD64, IMAGE_FILE_MACHINE_I386, IMAGE_SCN_CNT_CODE,
    IMAGE_SYM_CLASS_EXTERNAL, IMAGE_SYM_CLASS_STATIC,
};
pub use section::{SectionHeader, SECTION_HEADER_SIZE};
pub use symbol::{SymbolIter, SymbolName, SymbolRecord, OUT_OF_RANGE_NAME, SYMBOL_RECORD_SIZE};

use crate::ParseError;
use std::collections::BTreeMap;

/// Machine type of a supported object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    I386,
    Amd64,
}

impl Machine {
    /// Maps the raw machine field to a supported machine.
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            IMAGE_FILE_MACHINE_I386 => Some(Machine::I386),
            IMAGE_FILE_MACHINE_AMD64 => Some(Machine::Amd64),
            _ => None,
        }
    }

    /// True for 64-bit code.
    pub fn is_x64(&self) -> bool {
        matches!(self, Machine::Amd64)
    }
}

/// Decides whether a member payload is an object worth analyzing.
///
/// Returns `None` (skip silently) when the payload cannot hold a file header,
/// the machine is not x86/x64, or the object carries no symbol table.
pub fn probe(data: &[u8]) -> Option<Machine> {
    if data.len() < FileHeader::SIZE {
        return None;
    }
    let header = FileHeader::parse(data).ok()?;
    let machine = Machine::from_raw(header.machine)?;
    if header.pointer_to_symbol_table == 0 || header.number_of_symbols == 0 {
        return None;
    }
    Some(machine)
}

/// One function's resolved name and code bytes.
#[derive(Debug, Clone)]
pub struct FunctionSpan<'data> {
    /// Symbol name, trailing whitespace trimmed, never empty.
    pub name: String,
    /// The function's bytes inside the object's section raw data. May be
    /// empty for a zero-length symbol.
    pub bytes: &'data [u8],
}

/// A parsed COFF object over a borrowed buffer.
#[derive(Debug)]
pub struct CoffObject<'data> {
    data: &'data [u8],
    /// File header.
    pub header: FileHeader,
    /// Section headers, in file order. May be shorter than
    /// `header.number_of_sections` if the object is truncated.
    pub sections: Vec<SectionHeader>,
}

impl<'data> CoffObject<'data> {
    /// Parse the file header and as many section headers as the buffer
    /// actually holds.
    pub fn parse(data: &'data [u8]) -> Result<Self, ParseError> {
        let header = FileHeader::parse(data)?;
        let sections_offset = header.section_headers_offset();

        let mut sections = Vec::with_capacity(header.number_of_sections as usize);
        for i in 0..header.number_of_sections as usize {
            let offset = sections_offset + i * SECTION_HEADER_SIZE;
            let Some(raw) = data.get(offset..offset + SECTION_HEADER_SIZE) else {
                break;
            };
            sections.push(SectionHeader::parse(raw)?);
        }

        Ok(Self {
            data,
            header,
            sections,
        })
    }

    /// Derives the name and byte span of every function symbol defined in a
    /// code section.
    ///
    /// Function symbols are grouped per section and ordered by their `value`
    /// offset; each function runs up to the next symbol in the same section,
    /// the last one up to the end of the section's raw data. Symbols whose
    /// derived span falls outside the object are dropped, as are symbols that
    /// resolve to an empty name.
    pub fn code_functions(&self) -> Vec<FunctionSpan<'data>> {
        let string_table = self.header.string_table_offset();

        // Bucket by section number. BTreeMap keeps section iteration in
        // ascending order so duplicate names across sections resolve the same
        // way on every run.
        let mut by_section: BTreeMap<u16, Vec<SymbolRecord>> = BTreeMap::new();
        let symbols = SymbolIter::new(
            self.data,
            self.header.pointer_to_symbol_table as usize,
            self.header.number_of_symbols,
        );
        for record in symbols {
            if !record.is_definition_class() || !record.is_function() {
                continue;
            }
            if record.section_number <= 0
                || record.section_number as u16 > self.header.number_of_sections
            {
                continue;
            }
            let section_number = record.section_number as u16;
            let Some(section) = self.sections.get(section_number as usize - 1) else {
                continue;
            };
            if !section.is_code() {
                continue;
            }
            by_section.entry(section_number).or_default().push(record);
        }

        let mut functions = Vec::new();
        for (section_number, mut records) in by_section {
            let section = &self.sections[section_number as usize - 1];
            records.sort_by_key(|record| record.value);

            for index in 0..records.len() {
                let record = &records[index];
                let length = match records.get(index + 1) {
                    Some(next) => (next.value - record.value) as usize,
                    None => match section.size_of_raw_data.checked_sub(record.value) {
                        Some(length) => length as usize,
                        // `value` past the section's raw data.
                        None => continue,
                    },
                };

                let name = record.name.resolve(self.data, string_table);
                if name.is_empty() {
                    continue;
                }

                let start = section.pointer_to_raw_data as usize + record.value as usize;
                let Some(bytes) = start
                    .checked_add(length)
                    .and_then(|end| self.data.get(start..end))
                else {
                    continue;
                };
                functions.push(FunctionSpan { name, bytes });
            }
        }
        functions
    }
}
