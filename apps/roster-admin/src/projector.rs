//! Join of users against coupons, plus the name filter and sort applied to
//! the user table.
//!
//! Everything here is a pure function of its inputs. Callers recompute the
//! projection for every view instead of holding on to derived rows.

use roster_shared::{Coupon, User};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Shown when a user has no coupon or the coupon is unknown.
pub const NO_REFERENCE: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectedRow {
    #[serde(flatten)]
    pub user: User,
    #[serde(rename = "couponReference")]
    pub coupon_reference: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "asc", alias = "ascending")]
    Ascending,
    #[serde(rename = "desc", alias = "descending")]
    Descending,
}

impl SortOrder {
    pub fn toggle(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Operator-controlled view parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub sort: SortOrder,
}

impl ViewQuery {
    pub fn new(filter: impl Into<String>, sort: SortOrder) -> Self {
        Self {
            filter: filter.into(),
            sort,
        }
    }
}

/// Coupon lookup by exact code. The first coupon carrying a code wins.
struct CouponIndex<'a> {
    by_code: HashMap<&'a str, &'a Coupon>,
}

impl<'a> CouponIndex<'a> {
    fn build(coupons: &'a [Coupon]) -> Self {
        let mut by_code = HashMap::with_capacity(coupons.len());
        let mut duplicates = 0usize;

        for coupon in coupons {
            let Some(code) = coupon.code.as_deref() else {
                continue;
            };
            match by_code.entry(code) {
                Entry::Vacant(slot) => {
                    slot.insert(coupon);
                }
                Entry::Occupied(_) => {
                    duplicates += 1;
                    tracing::debug!("Coupon code {:?} is shared by several coupons, keeping the first", code);
                }
            }
        }

        if duplicates > 0 {
            tracing::debug!("{} duplicate coupon codes ignored during join", duplicates);
        }

        Self { by_code }
    }

    fn reference_for(&self, user: &User) -> String {
        let coupon = user
            .coupon
            .as_deref()
            .and_then(|code| self.by_code.get(code).copied());
        reference_or_sentinel(coupon)
    }
}

fn reference_or_sentinel(coupon: Option<&Coupon>) -> String {
    coupon
        .and_then(|c| c.reference.as_deref())
        .filter(|r| !r.is_empty())
        .unwrap_or(NO_REFERENCE)
        .to_string()
}

/// Reference of the coupon whose code equals the user's coupon, or `"-"`.
pub fn coupon_reference(user: &User, coupons: &[Coupon]) -> String {
    let coupon = user.coupon.as_deref().and_then(|code| {
        coupons
            .iter()
            .find(|c| c.code.as_deref() == Some(code))
    });
    reference_or_sentinel(coupon)
}

/// One row per user, in user collection order.
pub fn join(users: &[User], coupons: &[Coupon]) -> Vec<ProjectedRow> {
    let index = CouponIndex::build(coupons);
    users
        .iter()
        .map(|user| ProjectedRow {
            user: user.clone(),
            coupon_reference: index.reference_for(user),
        })
        .collect()
}

pub fn name_matches(name: &str, filter: &str) -> bool {
    filter.is_empty() || name.to_lowercase().contains(&filter.to_lowercase())
}

/// Joins, keeps names containing `filter` (any case), then sorts by name.
pub fn project(
    users: &[User],
    coupons: &[Coupon],
    filter: &str,
    sort: SortOrder,
) -> Vec<ProjectedRow> {
    let mut rows: Vec<ProjectedRow> = join(users, coupons)
        .into_iter()
        .filter(|row| name_matches(&row.user.name, filter))
        .collect();

    // sort_by is stable; equal names keep collection order in both directions.
    rows.sort_by(|a, b| match sort {
        SortOrder::Ascending => locale_compare(&a.user.name, &b.user.name),
        SortOrder::Descending => locale_compare(&b.user.name, &a.user.name),
    });
    rows
}

/// Collation-style comparison in three levels: base letters (accents and
/// case stripped), then accents, then lowercase before uppercase at the first
/// case difference. Code points break any remaining tie.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| accented_letters(a).cmp(accented_letters(b)))
        .then_with(|| case_order(a, b))
        .then_with(|| a.cmp(b))
}

fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

fn accented_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd().flat_map(char::to_lowercase)
}

fn case_order(a: &str, b: &str) -> Ordering {
    for (x, y) in a.chars().zip(b.chars()) {
        if x == y {
            continue;
        }
        return match (x.is_lowercase(), y.is_lowercase()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        };
    }
    Ordering::Equal
}
