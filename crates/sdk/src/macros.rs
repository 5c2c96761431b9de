/// Convenience macro for emitting multiple events.
///
/// # Example
///
/// ```rust,ignore
/// fn handle(mut self, input: Print) -> Result<(Self, Emit), CommandError> {
///     self.lines.push(input.text.clone());
///     Ok((self, emit![Printed {
///         username: input.username,
///         text: input.text,
///     }]))
/// }
/// ```
///
/// Expands to:
///
/// ```rust,ignore
/// Emit::new()
///     .event(Printed { ... })
/// ```
#[macro_export]
macro_rules! emit {
    () => {
        $crate::emit::Emit::new()
    };
    ($($event:expr),+ $(,)?) => {
        $crate::emit::Emit::new()
            $(.event($event))+
    };
}
