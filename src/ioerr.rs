#[doc(hidden)]
#[macro_export]
macro_rules! ioerr {
    (@E $kind:expr, $arg:expr) => {
        ::std::io::Error::new($kind, $arg)
    };

    (NotFound $($tt:tt)*) => ( ioerr!(::std::io::ErrorKind::NotFound $($tt)*) );
    (AlreadyExists $($tt:tt)*) => ( ioerr!(::std::io::ErrorKind::AlreadyExists $($tt)*) );
    (InvalidInput $($tt:tt)*) => ( ioerr!(::std::io::ErrorKind::InvalidInput $($tt)*) );
    (InvalidData $($tt:tt)*) => ( ioerr!(::std::io::ErrorKind::InvalidData $($tt)*) );
    (WriteZero $($tt:tt)*) => ( ioerr!(::std::io::ErrorKind::WriteZero $($tt)*) );
    (Other $($tt:tt)*) => ( ioerr!(::std::io::ErrorKind::Other $($tt)*) );
    (UnexpectedEof $($tt:tt)*) => ( ioerr!(::std::io::ErrorKind::UnexpectedEof $($tt)*) );

    ($kind:path, $fmt:expr, $($tt:tt)+) => (
        ioerr!(@E $kind, format!($fmt, $($tt)+))
    );
    ($kind:expr, $fmt:expr, $($tt:tt)+) => (
        ioerr!(@E $kind, format!($fmt, $($tt)+))
    );
    ($kind:path, $arg:expr) => (
        ioerr!(@E $kind, $arg)
    );
    ($kind:expr, $arg:expr) => (
        ioerr!(@E $kind, $arg)
    );
    ($kind:path) => (
        ::std::io::Error::from($kind)
    );
    ($kind:expr) => (
        ::std::io::Error::from($kind)
    );
}
