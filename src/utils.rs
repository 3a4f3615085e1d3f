//! Useful functions for parsing and accounting.

use crate::{Account, Decimal};
use std::sync::Arc;

/// Parses a [`Decimal`](crate::Decimal) from a [`&str`], stripping `,`
/// grouping separators first.
pub fn parse_number(num_str: &str) -> Result<Decimal, String> {
    let stripped = if num_str.contains(',') {
        num_str.replace(',', "")
    } else {
        num_str.to_string()
    };
    if stripped.is_empty() {
        return Err("Empty number.".to_string());
    }
    stripped
        .parse::<Decimal>()
        .map_err(|_| format!("Invalid number {}.", num_str))
}

/// Path operations on colon-separated account names.
pub trait AccountExt {
    /// True if `self` lies below `parent`, i.e. `self` starts with `parent`
    /// followed by `:`. The empty parent is an ancestor of every account.
    fn under(&self, parent: &str) -> bool;
    /// The final path segment.
    fn leaf(&self) -> &str;
    /// All path segments, in order.
    fn parts(&self) -> std::str::Split<'_, char>;
}

impl AccountExt for str {
    fn under(&self, parent: &str) -> bool {
        if parent.is_empty() {
            return true;
        }
        self.len() > parent.len()
            && self.as_bytes()[parent.len()] == b':'
            && self.starts_with(parent)
    }

    fn leaf(&self) -> &str {
        self.rsplit(':').next().unwrap_or(self)
    }

    fn parts(&self) -> std::str::Split<'_, char> {
        self.split(':')
    }
}

/// One node of an account tree walk; `is_virtual` marks a synthesized
/// ancestor that appears in no entry itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub account: Account,
    pub is_virtual: bool,
}

/// Walks the tree implied by a sorted account list, synthesizing virtual
/// nodes for ancestor paths not present in the list. Each node is visited
/// exactly once, before its descendants; shared ancestors are not re-emitted,
/// using the longest common path prefix between consecutive accounts.
pub fn walk_accounts(accounts: &[Account]) -> Vec<TreeNode> {
    let mut nodes = Vec::new();
    let mut prev: &str = "";
    for account in accounts {
        let parts: Vec<&str> = account.parts().collect();
        let prev_parts: Vec<&str> = if prev.is_empty() {
            Vec::new()
        } else {
            prev.parts().collect()
        };
        let mut common = 0;
        while common < prev_parts.len()
            && common + 1 < parts.len()
            && parts[common] == prev_parts[common]
        {
            common += 1;
        }
        for depth in common..parts.len() - 1 {
            nodes.push(TreeNode {
                account: Arc::new(parts[..=depth].join(":")),
                is_virtual: true,
            });
        }
        nodes.push(TreeNode {
            account: account.clone(),
            is_virtual: false,
        });
        prev = account.as_str();
    }
    nodes
}
