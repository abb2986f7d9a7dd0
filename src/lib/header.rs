//! @PG record management for output headers.
//!
//! Every subcommand appends one @PG line to the header it propagates. The new record's
//! `PP` points at the last program of the existing chain, and its ID is made unique by
//! suffixing `.1`, `.2`, ... when the program name is already present.

use anyhow::Result;
use bstr::BString;
use noodles::sam::Header;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::Program;
use noodles::sam::header::record::value::map::program::tag;
use std::collections::HashSet;

/// Program name written to `@PG` records.
pub const PROGRAM_NAME: &str = "umirescue";

/// ID of the program at the end of the `PP` chain, if any.
#[must_use]
pub fn get_last_program_id(header: &Header) -> Option<String> {
    let programs = header.programs();
    let program_map = programs.as_ref();

    let referenced: HashSet<&[u8]> = program_map
        .values()
        .filter_map(|pg| pg.other_fields().get(&tag::PREVIOUS_PROGRAM_ID))
        .map(|pp| pp.as_slice())
        .collect();

    program_map
        .keys()
        .find(|id| !referenced.contains(id.as_slice()))
        .or_else(|| program_map.keys().next())
        .map(|id| String::from_utf8_lossy(id).to_string())
}

/// Returns `base_id`, or `base_id.N` for the smallest N that is not taken.
#[must_use]
pub fn make_unique_program_id(header: &Header, base_id: &str) -> String {
    let programs = header.programs();
    let program_map = programs.as_ref();

    if !program_map.contains_key(base_id.as_bytes()) {
        return base_id.to_string();
    }

    (1..)
        .map(|i| format!("{base_id}.{i}"))
        .find(|candidate| !program_map.contains_key(candidate.as_bytes()))
        .unwrap_or_else(|| format!("{base_id}.{}", std::process::id()))
}

/// Appends a `@PG` record for this program, chained to the previous last program.
///
/// # Errors
///
/// Returns an error if the program record cannot be built or added.
pub fn add_pg_record(mut header: Header, version: &str, command_line: &str) -> Result<Header> {
    let previous_program = get_last_program_id(&header);
    let unique_id = make_unique_program_id(&header, PROGRAM_NAME);

    let mut builder = Map::<Program>::builder()
        .insert(tag::NAME, PROGRAM_NAME)
        .insert(tag::VERSION, version)
        .insert(tag::COMMAND_LINE, command_line);
    if let Some(pp) = previous_program.as_deref() {
        builder = builder.insert(tag::PREVIOUS_PROGRAM_ID, pp);
    }

    header.programs_mut().add(BString::from(unique_id), builder.build()?)?;
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program<'a>(header: &'a Header, id: &str) -> &'a Map<Program> {
        header.programs().as_ref().get(id.as_bytes()).unwrap()
    }

    #[test]
    fn test_last_program_of_empty_header() {
        assert_eq!(get_last_program_id(&Header::default()), None);
    }

    #[test]
    fn test_last_program_follows_chain() {
        let mut header = Header::default();
        header.programs_mut().add(BString::from("bwa"), Map::<Program>::default()).unwrap();
        let pg = Map::<Program>::builder().insert(tag::PREVIOUS_PROGRAM_ID, "bwa").build().unwrap();
        header.programs_mut().add(BString::from("samtools"), pg).unwrap();

        assert_eq!(get_last_program_id(&header), Some("samtools".to_string()));
    }

    #[test]
    fn test_unique_program_id_suffixes() {
        let mut header = Header::default();
        assert_eq!(make_unique_program_id(&header, PROGRAM_NAME), "umirescue");

        header
            .programs_mut()
            .add(BString::from(PROGRAM_NAME), Map::<Program>::default())
            .unwrap();
        header
            .programs_mut()
            .add(BString::from("umirescue.1"), Map::<Program>::default())
            .unwrap();
        assert_eq!(make_unique_program_id(&header, PROGRAM_NAME), "umirescue.2");
    }

    #[test]
    fn test_add_pg_record_chains_and_records_command_line() {
        let mut header = Header::default();
        header.programs_mut().add(BString::from("bwa"), Map::<Program>::default()).unwrap();

        let header = add_pg_record(header, "0.1.0", "umirescue mark in.bam").unwrap();
        let header = add_pg_record(header, "0.1.0", "umirescue collapse -i x").unwrap();

        assert_eq!(header.programs().as_ref().len(), 3);
        let first = program(&header, "umirescue").other_fields();
        let second = program(&header, "umirescue.1").other_fields();
        assert_eq!(
            first.get(&tag::PREVIOUS_PROGRAM_ID).map(AsRef::as_ref),
            Some(b"bwa".as_slice())
        );
        assert_eq!(first.get(&tag::VERSION).map(AsRef::as_ref), Some(b"0.1.0".as_slice()));
        assert_eq!(
            second.get(&tag::PREVIOUS_PROGRAM_ID).map(AsRef::as_ref),
            Some(b"umirescue".as_slice())
        );
        assert_eq!(
            second.get(&tag::COMMAND_LINE).map(AsRef::as_ref),
            Some(b"umirescue collapse -i x".as_slice())
        );
    }
}
