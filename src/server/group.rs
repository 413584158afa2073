//! Route groups
//!
//! A [`RouteGroup`] is a scoped builder: it borrows the route table and
//! carries its own absolute prefix, so nesting never depends on what some
//! other group did before.

use super::{
    context::Handler,
    routes::{RouteTable, Verb, join_paths},
};

/// Path-prefixed scope for route registration
pub struct RouteGroup<'a> {
    table: &'a mut RouteTable,
    prefix: String,
}

impl<'a> RouteGroup<'a> {
    pub(crate) fn new(table: &'a mut RouteTable, prefix: String) -> Self {
        Self { table, prefix }
    }

    /// Absolute prefix of this group
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Sub-group under this group's prefix
    pub fn group(&mut self, prefix: &str) -> RouteGroup<'_> {
        let prefix = join_paths(&self.prefix, prefix);
        RouteGroup::new(&mut *self.table, prefix)
    }

    pub fn get<I>(&mut self, path: &str, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Verb::Get, path, handlers)
    }

    pub fn post<I>(&mut self, path: &str, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Verb::Post, path, handlers)
    }

    pub fn put<I>(&mut self, path: &str, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Verb::Put, path, handlers)
    }

    pub fn delete<I>(&mut self, path: &str, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Verb::Delete, path, handlers)
    }

    /// Register `handlers` for `verb` at `path` below this group
    pub fn handle<I>(&mut self, verb: Verb, path: &str, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        let full = join_paths(&self.prefix, path);
        self.table.add(verb, &full, handlers);
        self
    }
}
