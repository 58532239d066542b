#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

pub const KO: &str = "\
ENTRY       K00001                      KO
NAME        E1.1.1.1, adh
DEFINITION  alcohol dehydrogenase [EC:1.1.1.1]
PATHWAY     ko00010  Glycolysis / Gluconeogenesis
            ko00071  Fatty acid degradation
CLASS       Metabolism; Carbohydrate Metabolism; Glycolysis / Gluconeogenesis [PATH:ko00010]
DBLINKS     RN: R00623 R00754
            COG: COG1012
///
ENTRY       K00002                      KO
NAME        AKR1A1, adh
DBLINKS     RN: R01041
///
ENTRY       K00003                      KO
DEFINITION  homoserine dehydrogenase [EC:1.1.1.3]
CLASS       Metabolism; Amino Acid Metabolism; Glycine, serine and threonine metabolism
DBLINKS     RN: R01773 R99999
///
";

pub const REACTION: &str = "\
ENTRY       R00623                      Reaction
NAME        primary_alcohol:NAD+ oxidoreductase
EQUATION    C00226 + C00003 <=> C00071 + C00004 + C00080
ORTHOLOGY   K00001  alcohol dehydrogenase [EC:1.1.1.1]
PATHWAY     rn00010  Glycolysis / Gluconeogenesis
            rn00071  Fatty acid degradation
///
ENTRY       R00754                      Reaction
EQUATION    C00469 + C00003 <=> C00084 + C00004 + C00080
ORTHOLOGY   K00001  alcohol dehydrogenase [EC:1.1.1.1]
            K00002  alcohol dehydrogenase (NADP+) [EC:1.1.1.2]
PATHWAY     rn00010  Glycolysis / Gluconeogenesis
///
ENTRY       R01041                      Reaction
EQUATION    C00469 + C00006 <=> C00084 + C00005 + C00080
///
ENTRY       R01773                      Reaction
EQUATION    C00263 + C00003 => C00441 + C00004 + C00080 + G00001
ORTHOLOGY   K00003  homoserine dehydrogenase [EC:1.1.1.3]
///
";

pub const COMPOUND: &str = "\
ENTRY       C00003                      Compound
NAME        NAD+;
            NAD
FORMULA     C21H28N7O14P2
EXACT_MASS  664.1169
REACTION    R00623 R00754
            R01773
PATHWAY     map00760  Nicotinate and nicotinamide metabolism
///
ENTRY       C00469                      Compound
NAME        Ethanol;
FORMULA     C2H6O
EXACT_MASS  46.0419
REACTION    R00754 R01041
PATHWAY     map00010  Glycolysis / Gluconeogenesis
///
";

pub const GLYCAN: &str = "\
ENTRY       G00001                      Glycan
NAME        N-Acetyl-D-glucosaminyldiphosphodolichol
COMPOSITION (GlcNAc)1 (PP-Dol)1
MASS        221.2 (PP-Dol)
PATHWAY     map00510  N-Glycan biosynthesis
///
";

pub const MAPFORMULA: &str = "\
R00623: 00010: C00226 <=> C00071
R00754: 00010: C00469 => C00084
";

/// A knowledge-base directory with every family; glycans are gzipped.
pub fn write_kb() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().join("kegg")).unwrap();
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("ko"), KO).unwrap();
    fs::write(dir.join("reaction"), REACTION).unwrap();
    fs::write(dir.join("compound"), COMPOUND).unwrap();
    fs::write(dir.join("reaction_mapformula.lst"), MAPFORMULA).unwrap();

    let file = File::create(dir.join("glycan.gz")).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(GLYCAN.as_bytes()).unwrap();
    encoder.finish().unwrap();

    (temp, dir)
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Three organisms over the knowledge-base orthologs, plus one per-gene
/// metadata row.
pub const PRECALC: &str = "\
#OTU_IDs\tK00001\tK00002\tK00003\tmetadata_NSTI
otu1\t1\t0\t0\t0.02
otu2\t0\t2\t1\t0.11
otu3\t0\t0\t0\t0.5
metadata_KEGG_Pathways\tCarbohydrate Metabolism\tCarbohydrate Metabolism\tAmino Acid Metabolism\t
";

/// Writes `content` to `<dir>/<name>`, gzipping it when the name ends in
/// `.gz`.
pub fn write_table(dir: &std::path::Path, name: &str, content: &str) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(dir.join(name)).unwrap();
    if name.ends_with(".gz") {
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    } else {
        fs::write(&path, content).unwrap();
    }
    path
}
