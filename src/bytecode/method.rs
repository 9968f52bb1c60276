use crate::ir::ExceptionHandler;
use bitflags::bitflags;

bitflags! {
    /// Access flags on methods
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6-200-A.1
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

/// Method to compile, as loaded from its class file
#[derive(Clone, Debug)]
pub struct Method {
    /// Name (used only for logging)
    pub name: String,

    pub access_flags: MethodAccessFlags,

    /// Code array
    pub code: Vec<u8>,

    pub max_locals: usize,
    pub max_stack: usize,

    /// Exception table, in class file order (entry blocks are not resolved)
    pub exception_table: Vec<ExceptionHandler>,
}

impl Method {
    pub fn new(name: impl Into<String>, access_flags: MethodAccessFlags, code: Vec<u8>) -> Method {
        Method {
            name: name.into(),
            access_flags,
            code,
            max_locals: 0,
            max_stack: 0,
            exception_table: vec![],
        }
    }

    pub fn code_size(&self) -> usize {
        self.code.len()
    }

    pub fn is_synchronized(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::SYNCHRONIZED)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }
}
