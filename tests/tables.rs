mod common;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use micrometab::error::MetabError;
use micrometab::tables::{self, GeneTableFormat, OrganismGenes};

use common::{PRECALC, ids, write_table};

#[test]
fn compressed_table_keeps_requested_organisms() {
    let temp = tempfile::tempdir().unwrap();
    let path = write_table(temp.path(), "ko_13_5_precalculated.tab.gz", PRECALC);

    let organisms = tables::read_precalc_table(&path, &ids(&["otu2", "otu1"])).unwrap();
    assert_eq!(
        organisms,
        [
            OrganismGenes {
                name: "otu1".to_string(),
                nsti: Some(0.02),
                genes: ids(&["K00001"]),
            },
            OrganismGenes {
                name: "otu2".to_string(),
                nsti: Some(0.11),
                genes: ids(&["K00002", "K00003"]),
            },
        ]
    );
}

#[test]
fn no_requested_ids_loads_every_organism() {
    let temp = tempfile::tempdir().unwrap();
    let path = write_table(temp.path(), "precalculated.tab", PRECALC);

    let organisms = tables::read_gene_content(&path, GeneTableFormat::Precalc, &[]).unwrap();
    let names: Vec<&str> = organisms.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["otu1", "otu2", "otu3"]);
    assert!(organisms[2].genes.is_empty());
}

#[test]
fn unknown_ids_are_errors() {
    let temp = tempfile::tempdir().unwrap();
    let path = write_table(temp.path(), "precalculated.tab.gz", PRECALC);

    assert_matches!(
        tables::read_precalc_table(&path, &ids(&["otu1", "otu9"])),
        Err(MetabError::MissingOrganisms { missing: 1, examples }) if examples == "otu9"
    );
    assert_matches!(
        tables::read_precalc_table(&path, &ids(&["otu8", "otu9"])),
        Err(MetabError::NoMatchingOrganisms { .. })
    );
    // Per-gene metadata rows are never organisms.
    assert_matches!(
        tables::read_precalc_table(&path, &ids(&["metadata_KEGG_Pathways"])),
        Err(MetabError::NoMatchingOrganisms { .. })
    );
}

#[test]
fn bad_counts_only_matter_for_loaded_rows() {
    let temp = tempfile::tempdir().unwrap();
    let table = "#OTU_IDs\tK00001\tmetadata_NSTI\nok\t3\t0.1\nbroken\tmany\t0.2\n";
    let path = write_table(temp.path(), "precalculated.tab", table);

    let organisms = tables::read_precalc_table(&path, &ids(&["ok"])).unwrap();
    assert_eq!(organisms[0].genes, ["K00001"]);
    assert_matches!(
        tables::read_precalc_table(&path, &ids(&["broken"])),
        Err(MetabError::MalformedRecord { family: "precalculated table", id, .. }) if id == "line 3"
    );
}

#[test]
fn missing_table_is_a_filesystem_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("absent.tab.gz")).unwrap();
    assert_matches!(
        tables::read_precalc_table(&path, &ids(&["otu1"])),
        Err(MetabError::Filesystem(_))
    );
}
