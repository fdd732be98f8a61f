//! Typed property accessors.

use crate::error::ViewError;

/// Something that can describe itself in error messages.
pub trait Describe {
    fn describe(&self) -> String;
}

/// A property of `O` with an optional getter and an optional setter.
///
/// Reading a property without a getter fails with [`ViewError::NotImplemented`]; writing one
/// without a setter fails with [`ViewError::ReadOnlyProperty`]. Setters decide on their own
/// whether a write is legal, e.g. by calling [`guard_unloaded`].
pub struct Property<O, T> {
    pub(crate) name: &'static str,
    pub(crate) getter: Option<fn(&O) -> T>,
    pub(crate) setter: Option<fn(&mut O, T) -> Result<(), ViewError>>,
}

impl<O: Describe, T> Property<O, T> {
    pub fn new(
        name: &'static str,
        getter: Option<fn(&O) -> T>,
        setter: Option<fn(&mut O, T) -> Result<(), ViewError>>,
    ) -> Self {
        Property {
            name,
            getter,
            setter,
        }
    }

    /// A computed property that can only be read.
    pub fn read_only(name: &'static str, getter: fn(&O) -> T) -> Self {
        Property::new(name, Some(getter), None)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, owner: &O) -> Result<T, ViewError> {
        match self.getter {
            Some(getter) => Ok(getter(owner)),
            None => Err(ViewError::NotImplemented {
                view: owner.describe(),
                property: self.name,
            }),
        }
    }

    pub fn set(&self, owner: &mut O, value: T) -> Result<(), ViewError> {
        match self.setter {
            Some(setter) => setter(owner, value),
            None => Err(ViewError::ReadOnlyProperty {
                view: owner.describe(),
                property: self.name,
            }),
        }
    }
}

/// Fails with [`ViewError::IllegalState`] if `loaded` is set.
pub fn guard_unloaded<O: Describe>(
    owner: &O,
    loaded: bool,
    property: &'static str,
) -> Result<(), ViewError> {
    if loaded {
        Err(ViewError::IllegalState {
            view: owner.describe(),
            property,
        })
    } else {
        Ok(())
    }
}
