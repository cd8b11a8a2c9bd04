//! Parsers for `zfs list -H` / `zpool list -H` output.
//!
//! Scripted mode prints one record per line with tab-separated columns. Tabs
//! are authoritative when present so an empty column survives as an empty
//! string; lines without tabs fall back to whitespace splitting. A line with the
//! wrong number of columns is rejected rather than truncated.

use poolward_core::error::{PoolError, PoolResult};
use poolward_core::model::{Dataset, DatasetKind, Filesystem, Inventory, Snapshot};

pub(crate) const POOL_LIST_QUERY: &str = "pool list";
pub(crate) const DATASET_LIST_QUERY: &str = "dataset list";
pub(crate) const FILESYSTEM_LIST_QUERY: &str = "filesystem list";
pub(crate) const SNAPSHOT_LIST_QUERY: &str = "snapshot list";
pub(crate) const FILESYSTEM_QUERY: &str = "filesystem lookup";

fn split_fields(line: &str, expected: usize) -> Result<Vec<&str>, String> {
    let fields: Vec<&str> = if line.contains('\t') {
        line.split('\t').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    };

    if fields.len() != expected {
        return Err(format!(
            "expected {expected} fields, found {} in {line:?}",
            fields.len()
        ));
    }
    Ok(fields)
}

fn parse_records<T, F>(query: &str, out: &[u8], expected: usize, build: F) -> PoolResult<Vec<T>>
where
    F: Fn(&[&str]) -> Result<T, String>,
{
    let text = std::str::from_utf8(out).map_err(|err| PoolError::MalformedOutput {
        query: query.to_string(),
        line: 0,
        reason: format!("output is not valid UTF-8: {err}"),
    })?;

    let mut records = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let record = split_fields(line, expected)
            .and_then(|fields| build(&fields))
            .map_err(|reason| PoolError::MalformedOutput {
                query: query.to_string(),
                line: idx + 1,
                reason,
            })?;
        records.push(record);
    }
    Ok(records)
}

/// `zpool list -H -o name`
pub(crate) fn parse_pool_names(out: &[u8]) -> PoolResult<Vec<String>> {
    parse_records(POOL_LIST_QUERY, out, 1, |fields| Ok(fields[0].to_string()))
}

/// `zfs list -H -o name,type,origin,guid`
pub(crate) fn parse_datasets(out: &[u8]) -> PoolResult<Inventory> {
    parse_records(DATASET_LIST_QUERY, out, 4, |fields| {
        Ok(Dataset {
            name: fields[0].to_string(),
            kind: fields[1].parse::<DatasetKind>()?,
            origin: fields[2].to_string(),
            guid: fields[3].to_string(),
        })
    })
    .map(Inventory::new)
}

/// `zfs list -H -o name,origin -t filesystem`
pub(crate) fn parse_filesystems(out: &[u8]) -> PoolResult<Vec<Filesystem>> {
    parse_filesystem_rows(FILESYSTEM_LIST_QUERY, out)
}

fn parse_filesystem_rows(query: &str, out: &[u8]) -> PoolResult<Vec<Filesystem>> {
    parse_records(query, out, 2, |fields| {
        Ok(Filesystem {
            name: fields[0].to_string(),
            origin: fields[1].to_string(),
        })
    })
}

/// `zfs list -H -o name,guid -t snapshot`
pub(crate) fn parse_snapshots(out: &[u8]) -> PoolResult<Vec<Snapshot>> {
    parse_records(SNAPSHOT_LIST_QUERY, out, 2, |fields| {
        Ok(Snapshot {
            name: fields[0].to_string(),
            guid: fields[1].to_string(),
        })
    })
}

/// Single-row variant of [`parse_filesystems`]; anything but one row is malformed.
pub(crate) fn parse_single_filesystem(out: &[u8]) -> PoolResult<Filesystem> {
    let mut rows = parse_filesystem_rows(FILESYSTEM_QUERY, out)?;
    if rows.len() != 1 {
        return Err(PoolError::MalformedOutput {
            query: FILESYSTEM_QUERY.to_string(),
            line: rows.len(),
            reason: format!("expected exactly one row, found {}", rows.len()),
        });
    }
    Ok(rows.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolward_core::error::ErrorKind;

    #[test]
    fn filesystems_keep_literal_dash_origin() {
        let parsed = parse_filesystems(b"poolA/fs1\t-\npoolA/fs2\torigin-x\n").expect("parse");
        assert_eq!(
            parsed,
            vec![
                Filesystem {
                    name: "poolA/fs1".into(),
                    origin: "-".into(),
                },
                Filesystem {
                    name: "poolA/fs2".into(),
                    origin: "origin-x".into(),
                },
            ]
        );
    }

    #[test]
    fn empty_origin_column_is_empty_string() {
        let inventory = parse_datasets(b"tank/a\tfilesystem\t\t123\n").expect("parse");
        let dataset = inventory.find("tank/a").expect("present");
        assert_eq!(dataset.origin, "");
        assert_eq!(dataset.guid, "123");
    }

    #[test]
    fn datasets_keep_emission_order() {
        let out = b"tank\tfilesystem\t-\t1\n\
tank/zeta\tfilesystem\t-\t2\n\
tank/zeta@first\tsnapshot\t-\t3\n\
tank/alpha\tfilesystem\ttank/zeta@first\t4\n\
tank/vol\tvolume\t-\t5\n";
        let inventory = parse_datasets(out).expect("parse");
        let names: Vec<_> = inventory.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["tank", "tank/zeta", "tank/zeta@first", "tank/alpha", "tank/vol"]
        );
        assert_eq!(inventory.as_slice()[2].kind, DatasetKind::Snapshot);
        assert_eq!(inventory.as_slice()[4].kind, DatasetKind::Volume);
    }

    #[test]
    fn whitespace_separated_lines_are_accepted() {
        let parsed = parse_snapshots(b"tank/a@one   42\ntank/a@two 43\n").expect("parse");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].name, "tank/a@two");
        assert_eq!(parsed[1].guid, "43");
    }

    #[test]
    fn short_line_is_malformed_output() {
        let err = parse_datasets(b"tank\tfilesystem\t-\t1\ntank/a\tfilesystem\n")
            .expect_err("short line must fail");
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
        match err {
            PoolError::MalformedOutput { line, query, .. } => {
                assert_eq!(line, 2);
                assert_eq!(query, DATASET_LIST_QUERY);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn extra_column_is_malformed_output() {
        let err =
            parse_filesystems(b"tank/a\t-\tsurplus\n").expect_err("extra column must fail");
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
        match err {
            PoolError::MalformedOutput { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = parse_snapshots(b"tank/a@one 1 2\n").expect_err("extra field must fail");
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
    }

    #[test]
    fn unknown_type_is_malformed_output() {
        let err = parse_datasets(b"tank/a\tdirectory\t-\t1\n").expect_err("unknown type");
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
    }

    #[test]
    fn empty_output_yields_empty_sequences() {
        assert!(parse_filesystems(b"").expect("parse").is_empty());
        assert!(parse_snapshots(b"\n").expect("parse").is_empty());
        assert!(parse_datasets(b"").expect("parse").is_empty());
    }

    #[test]
    fn single_filesystem_requires_one_row() {
        let fs = parse_single_filesystem(b"tank/a\t-\n").expect("parse");
        assert_eq!(fs.name, "tank/a");

        let none = parse_single_filesystem(b"").expect_err("zero rows");
        assert_eq!(none.kind(), ErrorKind::MalformedOutput);
        let many = parse_single_filesystem(b"tank/a\t-\ntank/b\t-\n").expect_err("two rows");
        assert_eq!(many.kind(), ErrorKind::MalformedOutput);
    }

    #[test]
    fn pool_names_parse_one_per_line() {
        assert_eq!(
            parse_pool_names(b"tank\nrpool\n").expect("parse"),
            vec!["tank".to_string(), "rpool".to_string()]
        );
    }

    #[test]
    fn invalid_utf8_is_malformed_output() {
        let err = parse_filesystems(&[0xff, 0xfe, b'\n']).expect_err("invalid utf-8");
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
    }
}
