use crate::model::{Note, User, UserWithNotes, UserWithSpouse};

pub trait UserDao {
    fn find_by_id(&self, id: i64) -> Option<User>;

    fn find(&self, id: i64, name: String) -> Vec<User>;

    fn find_all(&self, ids: Vec<i64>) -> Vec<User>;

    fn count(&self) -> i64;

    fn with_spouse(&self, id: i64) -> Option<UserWithSpouse>;

    fn with_notes(&self) -> Vec<UserWithNotes>;

    /// Replaces a user with the same id.
    fn insert(&self, user: User);

    fn insert_all(&self, users: Vec<User>);

    fn update(&self, user: User) -> u64;

    fn delete(&self, user: User);

    fn rename(&self, id: i64, name: String) -> u64;
}

pub trait NoteDao {
    fn by_author(&self, author_id: i64) -> kabin_runtime::Result<Vec<Note>>;

    fn pinned_uuids(&self, pinned: bool) -> Vec<uuid::Uuid>;

    fn insert(&self, note: Note) -> kabin_runtime::Result<()>;
}
