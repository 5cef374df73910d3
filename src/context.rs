/*!

The `Context` owns every piece of simulation state. Each component stores its data in a
*data plugin*, a value keyed by its own type, and exposes its API as an extension trait on
`Context` (`ContextRandomExt`, `ContextPopulationExt`, ...). Components never hold references
into one another; they re-borrow the context for each step, which keeps the single mutation
path for each plugin in one place.

*/

use crate::{HashMap, TypeId, type_of};
use std::any::Any;

/// A type that can live in a `Context` and knows how to construct its empty state.
pub trait DataPlugin: Any {
    fn create() -> Self;
}

pub struct Context {
    // This is actually a `HashMap<TypeId, Box<T: DataPlugin>>`.
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            data_plugins: HashMap::default(),
        }
    }

    /// Returns a mutable reference for the data container for `T`, creating it if it doesn't exist yet.
    pub fn get_data_container_mut<T: DataPlugin>(&mut self) -> &mut T {
        self.data_plugins
            .entry(type_of::<T>())
            .or_insert_with(|| Box::new(T::create()))
            .downcast_mut::<T>()
            .unwrap() // Will never panic as data container has the matching type
    }

    /// Returns a reference to the data container for `T` if it exists.
    /// If you need a mutable reference or lazy instantiation, use `Context::get_data_container_mut()`.
    pub fn get_data_container<T: DataPlugin>(&self) -> Option<&T> {
        self.data_plugins
            .get(&type_of::<T>())
            .and_then(|data| data.downcast_ref::<T>())
    }

    /// Reports whether a data container for `T` has been created.
    pub fn has_data_container<T: DataPlugin>(&self) -> bool {
        self.data_plugins.contains_key(&type_of::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct DayCounter(u32);
    impl DataPlugin for DayCounter {
        fn create() -> Self {
            DayCounter(0)
        }
    }

    #[derive(Debug, PartialEq)]
    struct Labels(Vec<&'static str>);
    impl DataPlugin for Labels {
        fn create() -> Self {
            Labels(vec![])
        }
    }

    #[test]
    fn containers_are_created_lazily() {
        let mut context = Context::new();
        assert!(context.get_data_container::<DayCounter>().is_none());
        assert!(!context.has_data_container::<DayCounter>());

        context.get_data_container_mut::<DayCounter>().0 += 1;
        assert!(context.has_data_container::<DayCounter>());
        assert_eq!(context.get_data_container::<DayCounter>(), Some(&DayCounter(1)));
    }

    #[test]
    fn containers_are_keyed_by_type() {
        let mut context = Context::new();
        {
            // If you specify the type of the variable the compiler can infer the generic type.
            let counter: &mut DayCounter = context.get_data_container_mut();
            counter.0 = 7;
        }
        {
            let labels: &mut Labels = context.get_data_container_mut();
            labels.0.push("S");
            labels.0.push("E");
        }

        assert_eq!(context.get_data_container::<DayCounter>().unwrap().0, 7);
        assert_eq!(context.get_data_container::<Labels>().unwrap().0, vec!["S", "E"]);
    }
}
