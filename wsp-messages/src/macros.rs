/// Build a message from a template and `key = value` pairs.
///
/// ```
/// use wsp_messages::msg;
/// assert_eq!(msg!("{a}-{b}", a = "x", b = "y"), "x-y");
/// ```
#[macro_export]
macro_rules! msg {
    ($template:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::builder::MessageBuilder::new($template)
            $(.var(stringify!($key), $value))*
            .build()
    };
}
