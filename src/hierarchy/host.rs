/* Standard library classes known without reading any class file */

use crate::hierarchy::descriptor::{ClassDescriptor, JAVA_LANG_OBJECT};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

const OBJECT: Option<&str> = Some(JAVA_LANG_OBJECT);

static HOST_CLASSES: Lazy<HashMap<String, Arc<ClassDescriptor>>> = Lazy::new(|| {
    let class = |name: &str, super_name: &str, interfaces: &[&str]| ClassDescriptor::host(name, Some(super_name), interfaces, false);
    let interface = |name: &str, interfaces: &[&str]| ClassDescriptor::host(name, OBJECT, interfaces, true);

    let table = vec![
        // java.lang
        ClassDescriptor::host(JAVA_LANG_OBJECT, None, &[], false),
        interface("java/lang/AutoCloseable", &[]),
        interface("java/lang/Runnable", &[]),
        interface("java/lang/Comparable", &[]),
        interface("java/lang/CharSequence", &[]),
        interface("java/lang/Cloneable", &[]),
        interface("java/lang/Iterable", &[]),
        interface("java/lang/Appendable", &[]),
        interface("java/lang/Readable", &[]),
        class("java/lang/String", JAVA_LANG_OBJECT, &["java/io/Serializable", "java/lang/Comparable", "java/lang/CharSequence"]),
        class("java/lang/StringBuffer", JAVA_LANG_OBJECT, &["java/io/Serializable", "java/lang/CharSequence", "java/lang/Appendable"]),
        class("java/lang/Thread", JAVA_LANG_OBJECT, &["java/lang/Runnable"]),
        class("java/lang/System", JAVA_LANG_OBJECT, &[]),
        class("java/lang/Math", JAVA_LANG_OBJECT, &[]),
        class("java/lang/Class", JAVA_LANG_OBJECT, &["java/io/Serializable"]),
        class("java/lang/Runtime", JAVA_LANG_OBJECT, &[]),
        class("java/lang/Number", JAVA_LANG_OBJECT, &["java/io/Serializable"]),
        class("java/lang/Integer", "java/lang/Number", &["java/lang/Comparable"]),
        class("java/lang/Long", "java/lang/Number", &["java/lang/Comparable"]),
        class("java/lang/Boolean", JAVA_LANG_OBJECT, &["java/io/Serializable", "java/lang/Comparable"]),
        class("java/lang/Throwable", JAVA_LANG_OBJECT, &["java/io/Serializable"]),
        class("java/lang/Exception", "java/lang/Throwable", &[]),
        class("java/lang/Error", "java/lang/Throwable", &[]),
        class("java/lang/RuntimeException", "java/lang/Exception", &[]),
        class("java/lang/IllegalArgumentException", "java/lang/RuntimeException", &[]),
        class("java/lang/IllegalStateException", "java/lang/RuntimeException", &[]),
        class("java/lang/NullPointerException", "java/lang/RuntimeException", &[]),
        class("java/lang/InterruptedException", "java/lang/Exception", &[]),
        // java.io
        interface("java/io/Serializable", &[]),
        interface("java/io/Closeable", &["java/lang/AutoCloseable"]),
        interface("java/io/Flushable", &[]),
        interface("java/io/DataInput", &[]),
        interface("java/io/DataOutput", &[]),
        class("java/io/IOException", "java/lang/Exception", &[]),
        class("java/io/EOFException", "java/io/IOException", &[]),
        class("java/io/InputStream", JAVA_LANG_OBJECT, &["java/io/Closeable"]),
        class("java/io/OutputStream", JAVA_LANG_OBJECT, &["java/io/Closeable", "java/io/Flushable"]),
        class("java/io/FilterInputStream", "java/io/InputStream", &[]),
        class("java/io/FilterOutputStream", "java/io/OutputStream", &[]),
        class("java/io/DataInputStream", "java/io/FilterInputStream", &["java/io/DataInput"]),
        class("java/io/DataOutputStream", "java/io/FilterOutputStream", &["java/io/DataOutput"]),
        class("java/io/ByteArrayInputStream", "java/io/InputStream", &[]),
        class("java/io/ByteArrayOutputStream", "java/io/OutputStream", &[]),
        class("java/io/PrintStream", "java/io/FilterOutputStream", &["java/lang/Appendable", "java/io/Closeable"]),
        class("java/io/Reader", JAVA_LANG_OBJECT, &["java/lang/Readable", "java/io/Closeable"]),
        class("java/io/Writer", JAVA_LANG_OBJECT, &["java/lang/Appendable", "java/io/Closeable", "java/io/Flushable"]),
        class("java/io/InputStreamReader", "java/io/Reader", &[]),
        class("java/io/OutputStreamWriter", "java/io/Writer", &[]),
        // java.util
        interface("java/util/Collection", &["java/lang/Iterable"]),
        interface("java/util/List", &["java/util/Collection"]),
        interface("java/util/Map", &[]),
        interface("java/util/Enumeration", &[]),
        interface("java/util/Iterator", &[]),
        interface("java/util/RandomAccess", &[]),
        interface("java/util/EventListener", &[]),
        class("java/util/AbstractCollection", JAVA_LANG_OBJECT, &["java/util/Collection"]),
        class("java/util/AbstractList", "java/util/AbstractCollection", &["java/util/List"]),
        class("java/util/Vector", "java/util/AbstractList", &["java/util/List", "java/util/RandomAccess", "java/lang/Cloneable", "java/io/Serializable"]),
        class("java/util/Stack", "java/util/Vector", &[]),
        class("java/util/Dictionary", JAVA_LANG_OBJECT, &[]),
        class("java/util/Hashtable", "java/util/Dictionary", &["java/util/Map", "java/lang/Cloneable", "java/io/Serializable"]),
        class("java/util/Random", JAVA_LANG_OBJECT, &["java/io/Serializable"]),
        class("java/util/Date", JAVA_LANG_OBJECT, &["java/io/Serializable", "java/lang/Cloneable", "java/lang/Comparable"]),
        class("java/util/Timer", JAVA_LANG_OBJECT, &[]),
        class("java/util/TimerTask", JAVA_LANG_OBJECT, &["java/lang/Runnable"]),
        // java.nio.channels
        interface("java/nio/channels/Channel", &["java/io/Closeable"]),
        interface("java/nio/channels/InterruptibleChannel", &["java/nio/channels/Channel"]),
        interface("java/nio/channels/NetworkChannel", &["java/nio/channels/Channel"]),
        interface("java/nio/channels/ReadableByteChannel", &["java/nio/channels/Channel"]),
        interface("java/nio/channels/WritableByteChannel", &["java/nio/channels/Channel"]),
        interface("java/nio/channels/ByteChannel", &["java/nio/channels/ReadableByteChannel", "java/nio/channels/WritableByteChannel"]),
        interface("java/nio/channels/ScatteringByteChannel", &["java/nio/channels/ReadableByteChannel"]),
        interface("java/nio/channels/GatheringByteChannel", &["java/nio/channels/WritableByteChannel"]),
        class("java/nio/channels/spi/AbstractInterruptibleChannel", JAVA_LANG_OBJECT, &["java/nio/channels/Channel", "java/nio/channels/InterruptibleChannel"]),
        class("java/nio/channels/SelectableChannel", "java/nio/channels/spi/AbstractInterruptibleChannel", &["java/nio/channels/Channel"]),
        class("java/nio/channels/spi/AbstractSelectableChannel", "java/nio/channels/SelectableChannel", &[]),
        class("java/nio/channels/ServerSocketChannel", "java/nio/channels/spi/AbstractSelectableChannel", &["java/nio/channels/NetworkChannel"]),
        class(
            "java/nio/channels/SocketChannel",
            "java/nio/channels/spi/AbstractSelectableChannel",
            &["java/nio/channels/ByteChannel", "java/nio/channels/ScatteringByteChannel", "java/nio/channels/GatheringByteChannel", "java/nio/channels/NetworkChannel"],
        ),
    ];
    table.into_iter().map(|d| (d.name.clone(), Arc::new(d))).collect()
});

/// Looks up a class in the bundled standard library table
pub fn host_class(name: &str) -> Option<Arc<ClassDescriptor>>
{
    HOST_CLASSES.get(name).cloned()
}

/// Names of every class in the bundled table
pub fn host_class_names() -> impl Iterator<Item = &'static str>
{
    HOST_CLASSES.keys().map(String::as_str)
}
