use crate::dao::{NoteDao, UserDao};

pub trait AppDatabase {
    fn user_dao(&self) -> &dyn UserDao;

    fn note_dao(&self) -> &dyn NoteDao;
}
