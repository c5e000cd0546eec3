use std::fmt;
use std::sync::Arc;

/// Entity -> projection mapping handed to a resource at construction.
pub struct ProjectionMapper<E, V> {
    map: Arc<dyn Fn(E) -> V + Send + Sync>,
    identity: bool,
}

impl<E, V> Clone for ProjectionMapper<E, V> {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
            identity: self.identity,
        }
    }
}

impl<E, V> fmt::Debug for ProjectionMapper<E, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionMapper")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl<E: 'static> ProjectionMapper<E, E> {
    /// The projection is the entity itself; nothing is converted.
    pub fn identity() -> Self {
        Self {
            map: Arc::new(|entity| entity),
            identity: true,
        }
    }
}

impl<E: 'static, V: 'static> ProjectionMapper<E, V> {
    pub fn from_fn(map: impl Fn(E) -> V + Send + Sync + 'static) -> Self {
        Self {
            map: Arc::new(map),
            identity: false,
        }
    }

    pub fn via_from() -> Self
    where
        V: From<E>,
    {
        Self::from_fn(V::from)
    }
}

impl<E, V> ProjectionMapper<E, V> {
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    pub fn map(&self, entity: E) -> V {
        (self.map)(entity)
    }

    pub fn map_all(&self, entities: Vec<E>) -> Vec<V> {
        entities.into_iter().map(|entity| self.map(entity)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Celsius(f64);
    struct Label(String);

    impl From<Celsius> for Label {
        fn from(value: Celsius) -> Self {
            Label(format!("{:.1}C", value.0))
        }
    }

    #[test]
    fn identity_returns_the_entity_unchanged() {
        let mapper = ProjectionMapper::<String, String>::identity();
        assert!(mapper.is_identity());
        assert_eq!(mapper.map("x".to_string()), "x");
    }

    #[test]
    fn via_from_uses_the_from_impl() {
        let mapper = ProjectionMapper::<Celsius, Label>::via_from();
        assert!(!mapper.is_identity());
        let labels = mapper.map_all(vec![Celsius(1.0), Celsius(2.26)]);
        let labels: Vec<_> = labels.into_iter().map(|label| label.0).collect();
        assert_eq!(labels, ["1.0C", "2.3C"]);
    }
}
