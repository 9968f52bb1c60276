use std::collections::HashMap;

/// Access to the constant pool of the class declaring the method being compiled
///
/// Graph construction only passes this through. The only thing it ever asks for is the name of
/// the class at some index (for catch types).
pub trait ConstantPool {
    /// Binary name of the class constant at this index (eg. `java/lang/Throwable`)
    fn class_name(&self, index: u16) -> Option<&str>;
}

impl ConstantPool for HashMap<u16, String> {
    fn class_name(&self, index: u16) -> Option<&str> {
        self.get(&index).map(String::as_str)
    }
}
