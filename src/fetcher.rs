use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    error::Result,
    source::DirectorySource,
    types::{DriveEntry, Inventory},
};

/// Callback receiving the running entry count during a walk
pub type ProgressFn<'a> = dyn Fn(usize) + Send + Sync + 'a;

/// Where a folder's listing continues from
enum Cursor {
    First,
    Next(String),
    Done,
}

/// A folder being walked: the unprocessed rest of its current page and
/// where its next page starts
struct Frame {
    folder_id: String,
    pending: VecDeque<DriveEntry>,
    cursor: Cursor,
}

impl Frame {
    fn new(folder_id: String) -> Self {
        Self {
            folder_id,
            pending: VecDeque::new(),
            cursor: Cursor::First,
        }
    }
}

/// Walks the remote folder graph into a flat pre-order inventory
///
/// Each child is appended in listing order and a folder's subtree follows
/// the folder immediately, before its next sibling. Folders are descended
/// into at most once, so parent cycles terminate.
pub struct TreeFetcher {
    source: Arc<dyn DirectorySource>,
}

impl TreeFetcher {
    pub fn new(source: Arc<dyn DirectorySource>) -> Self {
        Self { source }
    }

    /// Walk everything below `root_id`
    pub async fn fetch_tree(&self, root_id: &str) -> Result<Inventory> {
        self.fetch_tree_with_progress(root_id, None).await
    }

    /// Walk everything below `root_id`, reporting the running count after
    /// each appended entry
    ///
    /// Any failed listing call aborts the whole walk.
    pub async fn fetch_tree_with_progress(
        &self,
        root_id: &str,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<Inventory> {
        let mut inventory = Inventory::default();
        let mut visited = HashSet::from([root_id.to_string()]);
        let mut stack = vec![Frame::new(root_id.to_string())];

        while let Some(frame) = stack.last_mut() {
            if let Some(child) = frame.pending.pop_front() {
                let descend = child.is_folder() && visited.insert(child.id.clone());
                if child.is_folder() && !descend {
                    warn!(id = %child.id, folder = %child.name, "folder already walked, not descending again");
                }
                let child_id = descend.then(|| child.id.clone());

                inventory.push(child);
                if let Some(report) = progress {
                    report(inventory.len());
                }

                if let Some(id) = child_id {
                    debug!(folder = %id, "descending into folder");
                    stack.push(Frame::new(id));
                }
                continue;
            }

            let page_token = match &frame.cursor {
                Cursor::First => None,
                Cursor::Next(token) => Some(token.clone()),
                Cursor::Done => {
                    stack.pop();
                    continue;
                }
            };

            let page = self
                .source
                .list_children(&frame.folder_id, page_token.as_deref())
                .await?;
            debug!(
                folder = %frame.folder_id,
                children = page.entries.len(),
                more = page.next_page_token.is_some(),
                "listed page"
            );

            frame.pending.extend(page.entries);
            frame.cursor = match page.next_page_token {
                Some(token) => Cursor::Next(token),
                None => Cursor::Done,
            };
        }

        info!(
            root = %root_id,
            entries = inventory.len(),
            source = %self.source.identifier(),
            "walked remote tree"
        );
        Ok(inventory)
    }
}
