//
// Helper macros to declare boxes.
//

// List of top-level boxes, used in boxes.rs.
//
// Builds the MP4Box enum with a variant for each box, plus the
// FromBytes dispatch on fourcc.
macro_rules! def_boxes {
    ($($name:ident, $fourcc:tt;)+) => {

        /// The boxes that appear at file level.
        #[derive(Clone)]
        pub enum MP4Box {
            $(
                $name($name),
            )+
            GenericBox(GenericBox),
        }

        // Define FromBytes trait for the enum.
        impl FromBytes for MP4Box {
            fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<MP4Box> {
                let header = BoxHeader::peek(stream)?;
                log::trace!("MP4Box::from_bytes: header: {:?}", header);
                let b = header.fourcc.to_be_bytes();
                let e = match &b {
                    $(
                        $fourcc => MP4Box::$name($name::from_bytes(stream)?),
                    )+
                    _ => MP4Box::GenericBox(GenericBox::from_bytes(stream)?),
                };
                Ok(e)
            }

            fn min_size() -> usize {
                8
            }
        }

        // Define ToBytes trait for the enum.
        impl ToBytes for MP4Box {
            fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
                match self {
                    $(
                        &MP4Box::$name(ref b) => b.to_bytes(stream),
                    )+
                    &MP4Box::GenericBox(ref b) => b.to_bytes(stream),
                }
            }
        }

        // Define BoxInfo trait for the enum.
        impl BoxInfo for MP4Box {
            #[inline]
            fn fourcc(&self) -> FourCC {
                match self {
                    $(
                        &MP4Box::$name(ref b) => b.fourcc(),
                    )+
                    &MP4Box::GenericBox(ref b) => b.fourcc(),
                }
            }
        }

        // Define FullBox trait for the enum.
        impl FullBox for MP4Box {
            fn version(&self) -> Option<u8> {
                match self {
                    $(
                        &MP4Box::$name(ref b) => b.version(),
                    )+
                    &MP4Box::GenericBox(ref b) => b.version(),
                }
            }
            fn flags(&self) -> u32 {
                match self {
                    $(
                        &MP4Box::$name(ref b) => b.flags(),
                    )+
                    &MP4Box::GenericBox(ref b) => b.flags(),
                }
            }
        }

        // Debug implementation that delegates to the variant.
        impl Debug for MP4Box {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                match self {
                    $(
                        &MP4Box::$name(ref b) => Debug::fmt(b, f),
                    )+
                    &MP4Box::GenericBox(ref b) => Debug::fmt(b, f),
                }
            }
        }

        $(
            impl $name {
                pub fn to_mp4box(self) -> MP4Box {
                    MP4Box::$name(self)
                }
            }
        )+
    };
}

// Define one box.
//
// def_box! {
//     TypeName {
//         member: type,
//         member: type,
//     },
//     fourcc => "fourcc",
//     version => [ 1, deps ],
//     impls => [ boxinfo, debug, fromtobytes, fullbox ],
//  }
macro_rules! def_box {

    // impls => [ basebox ]
    (@IMPL basebox $name:ident, $_fourcc:expr, $_version:tt, $_block:tt) => {
        impl_basebox!($name);
    };

    // impls => [ fullbox ]
    (@IMPL fullbox $name:ident, $_fourcc:expr, $version:tt, $_block:tt) => {
        impl_fullbox!($name, $version);
    };

    // impls => [ boxinfo ]
    (@IMPL boxinfo $name:ident, $fourcc:expr, $version:tt, $_block:tt) => {
        impl_boxinfo!($name, $fourcc, $version);
    };

    // impls => [ debug ]
    (@IMPL debug $name:ident, $_fourcc:expr, $_version:tt, $block:tt) => {
        impl_debug!($name, $block);
    };

    // impls => [ fromtobytes ]
    (@IMPL fromtobytes $name:ident, $_fourcc:expr, $_version:tt, $block:tt) => {
        impl_fromtobytes!($name, $block);
    };

    // expand block and call def_struct!
    (@IMPL def_struct $(#[$outer:meta])* $name:ident, { $($block:tt)* }) => {
        def_struct!(@def_struct $(#[$outer])* $name, $($block)*);
    };

    // Main entry point.
    ($(#[$outer:meta])* $name:ident $block:tt, fourcc => $fourcc:expr,
     version => $version:tt, impls => [ $($impl:ident),* ] $(,)?) => {

        // Define the struct itself.
        def_box!(@IMPL def_struct $(#[$outer])* #[derive(Clone)] $name, $block);

        // And the impls we want for it.
        $(
            def_box!(@IMPL $impl $name, $fourcc, $version, $block);
        )*
    };
}

// Implement an empty FullBox trait for this struct.
macro_rules! impl_basebox {
    ($name:ident) => {
        // Not a fullbox - default impl.
        impl FullBox for $name {}
    };
}

// Implement the FullBox trait for this struct.
macro_rules! impl_fullbox {
    ($name:ident, [0]) => {
        // Fullbox always version 0.
        impl FullBox for $name {
            fn version(&self) -> Option<u8> {
                Some(0)
            }
        }
    };
    ($name:ident, [$maxver:tt $(,$deps:ident)+ ]) => {
        // Check all the dependencies for the minimum version.
        impl FullBox for $name {
            fn version(&self) -> Option<u8> {
                let mut v = 0;
                $(
                    if let Some(depver) = self.$deps.version() {
                        if depver > v {
                            v = depver;
                        }
                    }
                )+
                Some(v)
            }
            fn flags(&self) -> u32 {
                let mut flags = 0;
                $(
                    flags |= self.$deps.flags();
                )+
                flags
            }
        }
    };
}

// Implement the BoxInfo trait for this struct.
macro_rules! impl_boxinfo {
    ($name:ident, $fourcc:expr, [$($maxver:tt)? $(,$deps:ident)*]) => {
        impl BoxInfo for $name {
            const FOURCC: &'static str = $fourcc;

            #[inline]
            fn fourcc(&self) -> FourCC {
                FourCC::new($fourcc)
            }
            $(
                #[inline]
                fn max_version() -> Option<u8> {
                    Some($maxver)
                }
            )?
        }
    };
}

// Implement the Debug trait for this struct.
macro_rules! impl_debug {
    ($name:ident, { $( $field:tt: $type:tt $(<$gen:tt>)? ),* $(,)? }) => {
        // Debug implementation that adds the fourcc field.
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                let mut dbg = f.debug_struct(stringify!($name));
                dbg.field("fourcc", &self.fourcc());
                $(
                    def_struct!(@filter_skip $field, dbg.field(stringify!($field), &self.$field););
                )*
                dbg.finish()
            }
        }
    };
}

// Implement the FromBytes and ToBytes traits for this struct.
macro_rules! impl_fromtobytes {
    ($name:ident, { $( $field:tt: $type:tt $(<$gen:tt>)? ),* $(,)? }) => {
        impl FromBytes for $name {
            #[allow(unused_variables)]
            fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<$name> {
                let mut reader = BoxReader::new(stream, <$name as BoxInfo>::max_version())?;
                let reader = &mut reader;

                def_struct!(@from_bytes $name, reader, $(
                    $field: $type $(<$gen>)?,
                )*)
            }

            fn min_size() -> usize {
                $(
                    def_struct!(@min_size $type $(<$gen>)?) +
                )* 0
            }
        }

        impl ToBytes for $name {
            #[allow(unused_variables)]
            fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
                let mut writer = BoxWriter::new(stream, self)?;
                let writer = &mut writer;

                let r: io::Result<()> = def_struct!(@to_bytes self, writer, $(
                    $field: $type $(<$gen>)?,
                )*);
                r?;

                writer.finalize()
            }
        }
    };
}
