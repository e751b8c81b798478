use roster_shared::{Coupon, User};

use crate::client::{ApiClient, Collections};
use crate::error::FetchError;
use crate::projector::{self, ProjectedRow, ViewQuery};

/// Snapshot of both collections for one view session.
///
/// The collections are only ever replaced wholesale by a new load; nothing
/// mutates them in place.
#[derive(Debug, Clone, Default)]
pub struct Session {
    users: Vec<User>,
    coupons: Vec<Coupon>,
}

impl Session {
    /// State before any load has completed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_collections(collections: Collections) -> Self {
        Self {
            users: collections.users,
            coupons: collections.coupons,
        }
    }

    /// Fetches both collections; on failure no session is produced.
    pub async fn load(client: &ApiClient) -> Result<Self, FetchError> {
        let collections = client.fetch_collections().await?;
        Ok(Self::from_collections(collections))
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn coupons(&self) -> &[Coupon] {
        &self.coupons
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.coupons.is_empty()
    }

    pub fn project(&self, query: &ViewQuery) -> Vec<ProjectedRow> {
        projector::project(&self.users, &self.coupons, &query.filter, query.sort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::SortOrder;

    fn session() -> Session {
        Session::from_collections(Collections {
            users: vec![
                User::new("1", "Bob").with_coupon("B"),
                User::new("2", "alice").with_coupon("A"),
            ],
            coupons: vec![Coupon::new("A", "REF-A")],
        })
    }

    #[test]
    fn empty_session_projects_nothing() {
        let session = Session::empty();
        assert!(session.is_empty());
        assert!(session.project(&ViewQuery::default()).is_empty());
    }

    #[test]
    fn projection_reflects_query_each_time() {
        let session = session();

        let asc = session.project(&ViewQuery::default());
        assert_eq!(asc[0].user.name, "alice");
        assert_eq!(asc[0].coupon_reference, "REF-A");
        assert_eq!(asc[1].coupon_reference, "-");

        let filtered = session.project(&ViewQuery::new("BO", SortOrder::Descending));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].user.id, "1");

        assert_eq!(session.users().len(), 2);
        assert_eq!(session.coupons().len(), 1);
    }
}
