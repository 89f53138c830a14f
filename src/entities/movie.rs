use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movie")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub title: String,
    pub release_year: Option<i32>,
    #[sea_orm(column_type = "Text", nullable)]
    pub summary: Option<String>,
    pub poster_url: Option<String>,
    pub score: Option<f64>,
    pub director_id: Option<i32>,
    pub duration_minutes: Option<i32>,
    pub country: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::DirectorId",
        to = "super::person::Column::Id",
        on_delete = "SetNull"
    )]
    Director,
    #[sea_orm(has_many = "super::movie_genre::Entity")]
    MovieGenre,
    #[sea_orm(has_many = "super::movie_actor::Entity")]
    MovieActor,
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Director.def()
    }
}

impl Related<super::movie_genre::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MovieGenre.def()
    }
}

impl Related<super::movie_actor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MovieActor.def()
    }
}

impl Related<super::genre::Entity> for Entity {
    fn to() -> RelationDef {
        super::movie_genre::Relation::Genre.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::movie_genre::Relation::Movie.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Runtime formatted as hours and minutes, e.g. `2h 28m` or `45m`.
    pub fn duration_display(&self) -> Option<String> {
        let minutes = self.duration_minutes.filter(|m| *m > 0)?;
        let (hours, rest) = (minutes / 60, minutes % 60);
        Some(if hours > 0 { format!("{hours}h {rest}m") } else { format!("{rest}m") })
    }
}
