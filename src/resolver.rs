//! Genome-to-reactome resolution over a local knowledge base or a remote
//! annotation service.
//!
//! Both back ends share one contract: a gene list resolves to a set of
//! reaction ids, and reaction ids resolve to equations. A lookup that fails
//! for one id contributes nothing for that id and leaves a [`LookupWarning`];
//! it never fails the batch.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use crate::annotation::AnnotationClient;
use crate::cache::MemoCache;
use crate::domain::Equation;
use crate::error::MetabError;
use crate::kb::KbReader;

pub const DEFAULT_WORKERS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    NotFound,
    Unavailable,
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupWarning {
    pub id: String,
    pub kind: WarningKind,
    pub message: String,
}

impl LookupWarning {
    fn from_error(id: &str, err: &MetabError) -> Self {
        let kind = match err {
            MetabError::NotFound { .. } => WarningKind::NotFound,
            MetabError::MalformedRecord { .. } => WarningKind::Malformed,
            _ => WarningKind::Unavailable,
        };
        Self {
            id: id.to_string(),
            kind,
            message: err.to_string(),
        }
    }
}

pub trait ReactionResolver {
    fn resolve_genome(&mut self, genes: &[String]) -> Result<BTreeSet<String>, MetabError>;
    fn resolve_reactions(
        &mut self,
        reactions: &BTreeSet<String>,
    ) -> Result<Vec<Equation>, MetabError>;
    /// Drains the warnings recorded since the last call.
    fn take_warnings(&mut self) -> Vec<LookupWarning>;
}

impl<R: ReactionResolver + ?Sized> ReactionResolver for Box<R> {
    fn resolve_genome(&mut self, genes: &[String]) -> Result<BTreeSet<String>, MetabError> {
        (**self).resolve_genome(genes)
    }

    fn resolve_reactions(
        &mut self,
        reactions: &BTreeSet<String>,
    ) -> Result<Vec<Equation>, MetabError> {
        (**self).resolve_reactions(reactions)
    }

    fn take_warnings(&mut self) -> Vec<LookupWarning> {
        (**self).take_warnings()
    }
}

/// Deterministic resolution against a [`KbReader`].
pub struct LocalResolver {
    kb: KbReader,
    warnings: Vec<LookupWarning>,
}

impl LocalResolver {
    pub fn new(kb: KbReader) -> Self {
        Self {
            kb,
            warnings: Vec::new(),
        }
    }

}

impl ReactionResolver for LocalResolver {
    fn resolve_genome(&mut self, genes: &[String]) -> Result<BTreeSet<String>, MetabError> {
        let mut reactome = BTreeSet::new();
        for gene in genes {
            match self.kb.ortholog(gene)? {
                Some(ortholog) => reactome.extend(ortholog.reactions.iter().cloned()),
                None => {
                    let err = MetabError::not_found("orthologs", gene.as_str());
                    warn!(gene = %gene, "ortholog not present in knowledge base");
                    self.warnings.push(LookupWarning::from_error(gene, &err));
                }
            }
        }
        Ok(reactome)
    }

    fn resolve_reactions(
        &mut self,
        reactions: &BTreeSet<String>,
    ) -> Result<Vec<Equation>, MetabError> {
        let mut equations = Vec::with_capacity(reactions.len());
        for reaction in reactions {
            match self.kb.equation(reaction) {
                Ok(equation) => equations.push(equation.clone()),
                Err(err @ MetabError::NotFound { .. }) => {
                    warn!(reaction = %reaction, "reaction not present in knowledge base");
                    self.warnings.push(LookupWarning::from_error(reaction, &err));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(equations)
    }

    fn take_warnings(&mut self) -> Vec<LookupWarning> {
        std::mem::take(&mut self.warnings)
    }
}

/// Memoized remote answers, shareable between resolvers and organisms.
#[derive(Default)]
pub struct AnnotationCache {
    pub genes: MemoCache<BTreeSet<String>>,
    pub reactions: MemoCache<Equation>,
}

impl AnnotationCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolution through an [`AnnotationClient`] on a bounded worker pool.
pub struct RemoteResolver<C: AnnotationClient> {
    client: C,
    cache: Arc<AnnotationCache>,
    pool: ThreadPool,
    warnings: Mutex<Vec<LookupWarning>>,
}

impl<C: AnnotationClient> RemoteResolver<C> {
    pub fn new(client: C, workers: usize) -> Result<Self, MetabError> {
        Self::with_cache(client, workers, Arc::new(AnnotationCache::new()))
    }

    pub fn with_cache(
        client: C,
        workers: usize,
        cache: Arc<AnnotationCache>,
    ) -> Result<Self, MetabError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|idx| format!("micrometab-lookup-{idx}"))
            .build()
            .map_err(|err| MetabError::WorkerPool(err.to_string()))?;
        Ok(Self {
            client,
            cache,
            pool,
            warnings: Mutex::new(Vec::new()),
        })
    }

    pub fn cache(&self) -> &Arc<AnnotationCache> {
        &self.cache
    }

    fn record(&self, id: &str, err: &MetabError) {
        warn!(service = self.client.service(), id, error = %err, "annotation lookup degraded");
        let mut guard = self
            .warnings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.push(LookupWarning::from_error(id, err));
    }

    fn lookup_gene(&self, gene: &str) -> BTreeSet<String> {
        let outcome = self.cache.genes.get_or_try_compute(gene, || {
            match self.client.gene_reactions(gene) {
                Ok(Some(reactions)) => Ok(reactions),
                Ok(None) => {
                    self.record(gene, &MetabError::not_found("genes", gene));
                    Ok(BTreeSet::new())
                }
                Err(err) if err.is_upstream() => Err(err),
                Err(err) => {
                    self.record(gene, &err);
                    Ok(BTreeSet::new())
                }
            }
        });
        outcome.unwrap_or_else(|err| {
            self.record(gene, &err);
            BTreeSet::new()
        })
    }

    fn lookup_reaction(&self, reaction: &str) -> Option<Equation> {
        let outcome = self.cache.reactions.get_or_try_compute(reaction, || {
            match self.client.reaction_equation(reaction) {
                Ok(Some(equation)) => Ok(equation),
                Ok(None) => {
                    self.record(reaction, &MetabError::not_found("reactions", reaction));
                    Ok(Equation::default())
                }
                Err(err) if err.is_upstream() => Err(err),
                Err(err) => {
                    self.record(reaction, &err);
                    Ok(Equation::default())
                }
            }
        });
        match outcome {
            Ok(equation) if equation.is_empty() => None,
            Ok(equation) => Some(equation),
            Err(err) => {
                self.record(reaction, &err);
                None
            }
        }
    }
}

impl<C: AnnotationClient> ReactionResolver for RemoteResolver<C> {
    fn resolve_genome(&mut self, genes: &[String]) -> Result<BTreeSet<String>, MetabError> {
        debug!(genes = genes.len(), "resolving genome remotely");
        let this = &*self;
        let per_gene: Vec<BTreeSet<String>> = this
            .pool
            .install(|| genes.par_iter().map(|gene| this.lookup_gene(gene)).collect());
        Ok(per_gene.into_iter().flatten().collect())
    }

    fn resolve_reactions(
        &mut self,
        reactions: &BTreeSet<String>,
    ) -> Result<Vec<Equation>, MetabError> {
        debug!(reactions = reactions.len(), "resolving reactions remotely");
        let ids: Vec<&String> = reactions.iter().collect();
        let this = &*self;
        let equations: Vec<Option<Equation>> = this.pool.install(|| {
            ids.par_iter()
                .map(|reaction| this.lookup_reaction(reaction))
                .collect()
        });
        Ok(equations.into_iter().flatten().collect())
    }

    fn take_warnings(&mut self) -> Vec<LookupWarning> {
        let guard = self
            .warnings
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(guard)
    }
}
