mod common;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use micrometab::annotation::AnnotationClient;
use micrometab::domain::Equation;
use micrometab::error::MetabError;
use micrometab::kb::KbReader;
use micrometab::resolver::{
    AnnotationCache, LocalResolver, ReactionResolver, RemoteResolver, WarningKind,
};

use common::{ids, write_kb};

/// Knows K00001 -> R00623 and refuses K00500. Counters are shared so a
/// test can still read them after the client moves into a resolver.
#[derive(Default, Clone)]
struct MockKegg {
    gene_calls: Arc<Mutex<usize>>,
    reaction_calls: Arc<Mutex<usize>>,
}

impl MockKegg {
    fn gene_calls(&self) -> usize {
        *self.gene_calls.lock().unwrap()
    }

    fn reaction_calls(&self) -> usize {
        *self.reaction_calls.lock().unwrap()
    }
}

impl AnnotationClient for MockKegg {
    fn service(&self) -> &'static str {
        "mock-kegg"
    }

    fn gene_reactions(&self, gene: &str) -> Result<Option<BTreeSet<String>>, MetabError> {
        *self.gene_calls.lock().unwrap() += 1;
        match gene {
            "K00001" => Ok(Some(BTreeSet::from(["R00623".to_string()]))),
            "K00500" => Err(MetabError::UpstreamUnavailable {
                service: "mock-kegg",
                id: gene.to_string(),
                message: "connection refused".to_string(),
            }),
            _ => Ok(None),
        }
    }

    fn reaction_equation(&self, reaction: &str) -> Result<Option<Equation>, MetabError> {
        *self.reaction_calls.lock().unwrap() += 1;
        match reaction {
            "R00623" => Ok(Some("C00226 + C00003 <=> C00071 + C00004".parse()?)),
            _ => Ok(None),
        }
    }
}

#[test]
fn local_resolution_skips_unknown_ids_with_warnings() {
    let (_temp, dir) = write_kb();
    let mut resolver = LocalResolver::new(KbReader::new(dir));

    let reactome = resolver
        .resolve_genome(&ids(&["K00003", "K00404"]))
        .unwrap();
    assert_eq!(reactome, BTreeSet::from(["R01773", "R99999"].map(String::from)));

    let equations = resolver.resolve_reactions(&reactome).unwrap();
    assert_eq!(equations.len(), 1);
    assert!(equations[0].products.contains("G00001"));

    let warnings = resolver.take_warnings();
    let flagged: Vec<&str> = warnings.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(flagged, ["K00404", "R99999"]);
    assert!(warnings.iter().all(|w| w.kind == WarningKind::NotFound));
}

#[test]
fn cache_is_shared_between_resolvers() {
    let cache = Arc::new(AnnotationCache::new());
    let genes = ids(&["K00001", "K00002"]);

    let first_client = MockKegg::default();
    let mut first =
        RemoteResolver::with_cache(first_client.clone(), 3, Arc::clone(&cache)).unwrap();
    let reactome = first.resolve_genome(&genes).unwrap();
    first.resolve_reactions(&reactome).unwrap();
    assert_eq!(first_client.gene_calls(), 2);
    // K00002 is unknown upstream: warned once, remembered as empty.
    assert_eq!(first.take_warnings().len(), 1);

    let second_client = MockKegg::default();
    let mut second =
        RemoteResolver::with_cache(second_client.clone(), 3, Arc::clone(&cache)).unwrap();
    let reactome = second.resolve_genome(&genes).unwrap();
    let equations = second.resolve_reactions(&reactome).unwrap();
    assert_eq!(reactome, BTreeSet::from(["R00623".to_string()]));
    assert_eq!(equations.len(), 1);
    assert_eq!(second_client.gene_calls(), 0);
    assert_eq!(second_client.reaction_calls(), 0);
    assert_eq!(cache.genes.len(), 2);
    assert!(second.take_warnings().is_empty());
}

#[test]
fn upstream_outage_degrades_to_empty() {
    let mut resolver = RemoteResolver::new(MockKegg::default(), 1).unwrap();
    let reactome = resolver
        .resolve_genome(&ids(&["K00001", "K00500"]))
        .unwrap();
    assert_eq!(reactome.len(), 1);

    let equations = resolver.resolve_reactions(&reactome).unwrap();
    assert_eq!(equations.len(), 1);
    assert!(equations[0].reversible);

    let warnings = resolver.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].id, "K00500");
    assert_eq!(warnings[0].kind, WarningKind::Unavailable);
    assert!(resolver.cache().genes.get("K00500").is_none());

    resolver.resolve_genome(&ids(&["K00500"])).unwrap();
    assert_eq!(resolver.take_warnings().len(), 1);
}

#[test]
fn boxed_resolvers_share_the_contract() {
    let (_temp, dir) = write_kb();
    let mut resolvers: Vec<Box<dyn ReactionResolver>> = vec![
        Box::new(LocalResolver::new(KbReader::new(dir))),
        Box::new(RemoteResolver::new(MockKegg::default(), 2).unwrap()),
    ];
    for resolver in &mut resolvers {
        let reactome = resolver.resolve_genome(&ids(&["K00001"])).unwrap();
        assert!(reactome.contains("R00623"));
        let equations = resolver.resolve_reactions(&reactome).unwrap();
        assert!(equations.iter().any(|eq| eq.reactants.contains("C00226")));
    }
}
