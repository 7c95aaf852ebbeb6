use std::sync::{Mutex, MutexGuard};

use crate::{CoreError, Mapping, UrlStore};

/// Simple in-memory store for tests. Rows keep insertion order, like a
/// table scanned by rowid.
pub struct InMemoryRepo {
    rows: Mutex<Vec<Mapping>>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    fn rows(&self) -> Result<MutexGuard<'_, Vec<Mapping>>, CoreError> {
        self.rows
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlStore for InMemoryRepo {
    fn ensure_schema(&self) -> Result<(), CoreError> {
        Ok(())
    }

    fn find_by_short(&self, short: &str) -> Result<Option<Mapping>, CoreError> {
        Ok(self.rows()?.iter().find(|m| m.short == short).cloned())
    }

    fn find_by_long(&self, long: &str) -> Result<Vec<Mapping>, CoreError> {
        Ok(self
            .rows()?
            .iter()
            .filter(|m| m.long == long)
            .cloned()
            .collect())
    }

    fn find_by_long_substring(&self, fragment: &str) -> Result<Vec<Mapping>, CoreError> {
        Ok(self
            .rows()?
            .iter()
            .filter(|m| m.long.contains(fragment))
            .cloned()
            .collect())
    }

    fn insert(&self, mapping: &Mapping) -> Result<(), CoreError> {
        let mut rows = self.rows()?;
        if rows.iter().any(|m| m.short == mapping.short) {
            return Err(CoreError::DuplicateKey);
        }
        rows.push(mapping.clone());
        Ok(())
    }

    fn update(&self, short: &str, long: &str) -> Result<(), CoreError> {
        let mut rows = self.rows()?;
        match rows.iter_mut().find(|m| m.short == short) {
            Some(m) => {
                m.long = long.to_string();
                Ok(())
            }
            None => Err(CoreError::NotFound),
        }
    }

    fn delete(&self, short: &str) -> Result<usize, CoreError> {
        let mut rows = self.rows()?;
        let before = rows.len();
        rows.retain(|m| m.short != short);
        Ok(before - rows.len())
    }

    fn delete_matching(&self, fragment: &str) -> Result<usize, CoreError> {
        let mut rows = self.rows()?;
        let before = rows.len();
        rows.retain(|m| !m.long.contains(fragment));
        Ok(before - rows.len())
    }

    fn list_all(&self) -> Result<Vec<Mapping>, CoreError> {
        Ok(self.rows()?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_duplicate_short() {
        let repo = InMemoryRepo::new();
        repo.insert(&Mapping::new("a", "https://one")).unwrap();
        let err = repo.insert(&Mapping::new("a", "https://two")).unwrap_err();
        assert_eq!(err, CoreError::DuplicateKey);
        assert_eq!(repo.list_all().unwrap().len(), 1);
    }

    #[test]
    fn update_and_delete() {
        let repo = InMemoryRepo::new();
        assert_eq!(repo.update("a", "https://x").unwrap_err(), CoreError::NotFound);
        repo.insert(&Mapping::new("a", "https://one")).unwrap();
        repo.update("a", "https://two").unwrap();
        assert_eq!(repo.find_by_short("a").unwrap().unwrap().long, "https://two");
        assert_eq!(repo.delete("a").unwrap(), 1);
        assert_eq!(repo.delete("a").unwrap(), 0);
    }

    #[test]
    fn substring_queries() {
        let repo = InMemoryRepo::new();
        repo.insert(&Mapping::new("a", "https://one.example/x")).unwrap();
        repo.insert(&Mapping::new("b", "https://two.example/x")).unwrap();
        repo.insert(&Mapping::new("c", "https://one.example/y")).unwrap();
        assert_eq!(repo.find_by_long("https://one.example/x").unwrap().len(), 1);
        assert_eq!(repo.find_by_long_substring("one.example").unwrap().len(), 2);
        assert_eq!(repo.delete_matching("one.example").unwrap(), 2);
        let left = repo.list_all().unwrap();
        assert_eq!(left, vec![Mapping::new("b", "https://two.example/x")]);
    }
}
