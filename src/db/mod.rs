use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, ToSql};
use diesel::sql_types::{Integer, Text};
use std::fmt::{self, Display};
use std::io::Write;
use std::str::FromStr;

mod executor;
mod helper;
pub mod models;
pub mod schema;

pub use executor::Executor;
pub use helper::{Error, Helper};


#[derive(Debug, Clone, Copy)]
#[derive(Hash, Eq, PartialEq, Ord, PartialOrd)]
#[derive(AsExpression, FromSqlRow)]
#[sql_type = "Integer"]
pub struct Id(i32);

impl Id {
    pub fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for Id {
    fn from(id: i32) -> Self {
        Id(id)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<DB> FromSql<Integer, DB> for Id
where
    DB: Backend,
    i32: FromSql<Integer, DB>,
{
    fn from_sql(bytes: Option<&DB::RawValue>) -> deserialize::Result<Self> {
        <i32 as FromSql<Integer, DB>>::from_sql(bytes).map(Id)
    }
}

impl<DB> ToSql<Integer, DB> for Id
where
    DB: Backend,
    i32: ToSql<Integer, DB>,
{
    fn to_sql<W: Write>(&self, out: &mut serialize::Output<W, DB>) -> serialize::Result {
        ToSql::<Integer, DB>::to_sql(&self.0, out)
    }
}


/// Kind of a post, stored as its lowercase name.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
#[derive(AsExpression, FromSqlRow)]
#[sql_type = "Text"]
pub enum PostType {
    Article,
    News,
}

impl PostType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::News => "news",
        }
    }

    /// URL path segment under which posts of this kind are served.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Article => "articles",
            Self::News => "news",
        }
    }
}

impl Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown post type: {0:?}")]
pub struct UnknownPostType(String);

impl FromStr for PostType {
    type Err = UnknownPostType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article" => Ok(Self::Article),
            "news" => Ok(Self::News),
            other => Err(UnknownPostType(other.to_owned())),
        }
    }
}

impl<DB> FromSql<Text, DB> for PostType
where
    DB: Backend,
    String: FromSql<Text, DB>,
{
    fn from_sql(bytes: Option<&DB::RawValue>) -> deserialize::Result<Self> {
        let name = <String as FromSql<Text, DB>>::from_sql(bytes)?;

        Ok(name.parse::<PostType>()?)
    }
}

impl<DB> ToSql<Text, DB> for PostType
where
    DB: Backend,
    str: ToSql<Text, DB>,
{
    fn to_sql<W: Write>(&self, out: &mut serialize::Output<W, DB>) -> serialize::Result {
        ToSql::<Text, DB>::to_sql(self.as_str(), out)
    }
}


/// A like or a dislike.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Vote {
    Like,
    Dislike,
}

impl Vote {
    pub fn value(self) -> i32 {
        match self {
            Self::Like => 1,
            Self::Dislike => -1,
        }
    }
}
