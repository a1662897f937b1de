//! An ordered list of roots searched as one classpath.
//!
//! Lookups consult the [`ClasspathCache`] for the loaders that may hold a
//! name and query them in index order. The first hit wins, so an earlier
//! root shadows later ones.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{ClasspathCache, LoaderData};
use crate::context::LoaderContext;
use crate::error::Result;
use crate::loader::{Loader, RootSpec, create_loader};
use crate::resource::Resource;

/// Outcome of building one root's name index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub index: usize,
    pub root: String,
    pub names: usize,
    pub packages: usize,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct Classpath {
    loaders: Vec<Box<dyn Loader>>,
    cache: ClasspathCache,
    status: Vec<IndexStatus>,
    ctx: LoaderContext,
}

impl Classpath {
    pub fn new(ctx: LoaderContext) -> Self {
        Self {
            loaders: Vec::new(),
            cache: ClasspathCache::new(),
            status: Vec::new(),
            ctx,
        }
    }

    /// Builds every root and its index in parallel.
    ///
    /// Any root that cannot be constructed fails the whole call. A root whose
    /// index cannot be built is kept and searched for every name.
    pub fn open(roots: &[RootSpec], ctx: LoaderContext) -> Result<Self> {
        let loaders = roots
            .par_iter()
            .enumerate()
            .map(|(index, spec)| create_loader(spec, index, &ctx))
            .collect::<Result<Vec<_>>>()?;

        let data: Vec<Result<LoaderData>> = loaders.par_iter().map(|l| l.build_data()).collect();

        let mut classpath = Self::new(ctx);
        for (loader, data) in loaders.into_iter().zip(data) {
            classpath.register(loader, data);
        }
        debug!(
            roots = classpath.loaders.len(),
            names = classpath.cache.name_count(),
            "classpath opened"
        );
        Ok(classpath)
    }

    /// Appends one root after the existing ones and returns its index.
    pub fn push_root(&mut self, spec: &RootSpec) -> Result<usize> {
        let index = self.loaders.len();
        let loader = create_loader(spec, index, &self.ctx)?;
        let data = loader.build_data();
        self.register(loader, data);
        Ok(index)
    }

    fn register(&mut self, loader: Box<dyn Loader>, data: Result<LoaderData>) {
        let index = loader.index();
        let root = loader.root().display().to_string();
        let status = match data {
            Ok(data) => {
                let status = IndexStatus {
                    index,
                    root,
                    names: data.name_count(),
                    packages: data.package_count(),
                    error: None,
                };
                self.cache.merge(index, data);
                status
            }
            Err(e) => {
                warn!(root = %root, error = %e, "failed to index classpath root, it will be searched for every name");
                self.cache.mark_unindexed(index);
                IndexStatus {
                    index,
                    root,
                    names: 0,
                    packages: 0,
                    error: Some(e.to_string()),
                }
            }
        };
        self.status.push(status);
        self.loaders.push(loader);
    }

    pub fn find_resource(&self, name: &str) -> Option<Box<dyn Resource>> {
        self.find_resource_with_index(name).map(|(_, res)| res)
    }

    /// Like [`Self::find_resource`], also reporting which root served it.
    pub fn find_resource_with_index(&self, name: &str) -> Option<(usize, Box<dyn Resource>)> {
        self.cache
            .candidate_loaders(name)
            .into_iter()
            .find_map(|index| self.loaders[index].get_resource(name).map(|res| (index, res)))
    }

    /// Every root's copy of `name`, in root order.
    pub fn find_resources(&self, name: &str) -> Vec<(usize, Box<dyn Resource>)> {
        self.cache
            .candidate_loaders(name)
            .into_iter()
            .filter_map(|index| self.loaders[index].get_resource(name).map(|res| (index, res)))
            .collect()
    }

    pub fn loaders(&self) -> &[Box<dyn Loader>] {
        &self.loaders
    }

    pub fn cache(&self) -> &ClasspathCache {
        &self.cache
    }

    pub fn index_status(&self) -> &[IndexStatus] {
        &self.status
    }

    pub fn context(&self) -> &LoaderContext {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}
