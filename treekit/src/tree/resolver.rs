//! Child resolution

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::ResolveError;
use crate::node::{NodeData, NodeDescriptor, TreeNode};

/// Supplies the children of a composite node on refresh.
///
/// The returned list replaces the composite's children in order. Children
/// may carry pre-resolved grandchildren via
/// [`NodeDescriptor::with_children`].
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use treekit::{ChildResolver, NodeDescriptor, ResolveError, TreeNode};
///
/// struct Directory;
///
/// #[async_trait]
/// impl ChildResolver<PathBuf> for Directory {
///     async fn resolve_children(
///         &self,
///         parent: &TreeNode<PathBuf>,
///     ) -> Result<Vec<NodeDescriptor<PathBuf>>, ResolveError> {
///         let mut children = Vec::new();
///         let mut entries = tokio::fs::read_dir(parent.data()).await?;
///         while let Some(entry) = entries.next_entry().await? {
///             let path = entry.path();
///             let id = path.display().to_string();
///             children.push(if entry.file_type().await?.is_dir() {
///                 NodeDescriptor::composite(id, path).selectable().expandable(false)
///             } else {
///                 NodeDescriptor::leaf(id, path).selectable()
///             });
///         }
///         Ok(children)
///     }
/// }
/// ```
#[async_trait]
pub trait ChildResolver<T: NodeData>: Send + Sync {
    /// Resolve the current children of `parent`.
    async fn resolve_children(
        &self,
        parent: &TreeNode<T>,
    ) -> Result<Vec<NodeDescriptor<T>>, ResolveError>;
}

/// Adapter turning an async closure into a [`ChildResolver`].
///
/// The closure receives an owned snapshot of the composite.
pub struct FnResolver<T, F> {
    resolve: F,
    _data: PhantomData<fn() -> T>,
}

impl<T, F> FnResolver<T, F> {
    /// Creates a resolver that calls `resolve` with each parent.
    pub fn new(resolve: F) -> Self {
        Self {
            resolve,
            _data: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> ChildResolver<T> for FnResolver<T, F>
where
    T: NodeData,
    F: Fn(TreeNode<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<NodeDescriptor<T>>, ResolveError>> + Send + 'static,
{
    async fn resolve_children(
        &self,
        parent: &TreeNode<T>,
    ) -> Result<Vec<NodeDescriptor<T>>, ResolveError> {
        (self.resolve)(parent.clone()).await
    }
}

impl<T, F> std::fmt::Debug for FnResolver<T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnResolver").finish_non_exhaustive()
    }
}
