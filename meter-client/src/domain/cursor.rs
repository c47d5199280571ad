/// Last source reading id rolled into a destination stream for one label.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cursor {
    pub stream_name: String,
    pub label: String,
    pub position: i64,
}
