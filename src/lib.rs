//! xiprd：基于内存的 XIP（就地执行）块设备
//!
//! 把一段固定大小的内存当成按扇区寻址的磁盘，请求直接在调用方缓冲区和存储区之间拷贝，
//! 中间没有任何缓存。生命周期和请求路径见 [`disk::Device`]。

pub mod printk;

pub mod disk;
