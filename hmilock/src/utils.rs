use std::ops::RangeBounds;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
pub enum TryGetSingleError {
    #[error("collection is empty")]
    Empty,
    #[error("collection has more than one item")]
    MoreThanOne,
}

pub trait CollectionExt {
    type Item;

    fn try_get_single(&self) -> Result<&Self::Item, TryGetSingleError>;
}

impl <T> CollectionExt for [T] {
    type Item = T;

    fn try_get_single(&self) -> Result<&T, TryGetSingleError> {
        match self {
            [] => Err(TryGetSingleError::Empty),
            [single] => Ok(single),
            _ => Err(TryGetSingleError::MoreThanOne),
        }
    }
}

pub trait WithinExt {
    fn within(&self, range: impl RangeBounds<Self>) -> bool;
}

impl <T: PartialOrd<T>> WithinExt for T {
    fn within(&self, range: impl RangeBounds<Self>) -> bool {
        range.contains(self)
    }
}
