use std::{
    alloc::{handle_alloc_error, Layout},
    cell::UnsafeCell,
    num::NonZeroUsize,
    ptr::NonNull,
};

use paddy_ptr::{OwningPtr, Ptr, PtrMut};
use paddy_utils::OnDrop;

type DropFn = unsafe fn(OwningPtr<'_>);

/// 用于密集存储同质(同结构)数据\
/// 存储类似于数组,不过它是动态可变大小\
/// item_layout = Layout::new::\<T\>()\
/// \[T;capacity\]
pub struct BlobVec {
    /// 元素的内存布局
    item_layout: Layout,
    /// 容量:可容纳的元素 数量
    capacity: usize,
    /// 当前元素数量
    len: usize,
    /// 数组数据
    data: NonNull<u8>,
    // Some(f) ,f 释放元素空间的函数
    drop: Option<DropFn>,
}

impl BlobVec {
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
    /// true : is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    #[inline]
    pub fn layout(&self) -> Layout {
        self.item_layout
    }

    /// capacity : 初始容量(仅对于非ZST类型),ZST为usize::MAX
    pub unsafe fn new(
        item_layout: Layout,
        drop: Option<DropFn>,
        capacity: usize,
    ) -> BlobVec {
        let align = NonZeroUsize::new(item_layout.align())
            .expect("alignment must be > 0");
        debug_assert!(
            align.is_power_of_two(),
            "Alignment must be power of two."
        );
        // 延迟初始化 (当前给予的是无效地址)
        let data = unsafe { NonNull::new_unchecked(align.get() as *mut u8) };
        if item_layout.size() == 0 {
            BlobVec {
                // 这个无法访问,是无效地址(也不需要被访问,因为是ZST)
                data,
                // ZST(Zero Sized Type, 零大小类型) 的BlobVec 最大容量为 usize::MAX
                capacity: usize::MAX,
                len: 0,
                item_layout,
                drop,
            }
        } else {
            let mut blob_vec = BlobVec {
                data,
                capacity: 0,
                len: 0,
                item_layout,
                drop,
            };
            blob_vec.reserve_exact(capacity);
            blob_vec
        }
    }

    /// 将剩余容量扩展到 additional 大小\
    /// 若 剩余容量>=additional 则 啥也不做
    pub fn reserve_exact(&mut self, additional: usize) {
        // 剩余容量
        let available_space = self.capacity - self.len;
        if available_space < additional {
            // #safety : available_space < additional ==> additional - available_space > 0
            let increment = unsafe {
                NonZeroUsize::new_unchecked(additional - available_space)
            };
            self.grow_exact(increment);
        }
    }
    /// 将剩余容量扩展到 max{ additional , capacity + 剩余容量 } 大小\
    /// 若 剩余容量>=additional 则 啥也不做，否则采用加倍增长策略
    #[inline]
    pub fn reserve(&mut self, additional: usize) {
        #[cold]
        fn do_reserve(slf: &mut BlobVec, additional: usize) {
            let increment =
                slf.capacity.max(additional - (slf.capacity - slf.len));
            let increment = NonZeroUsize::new(increment).unwrap();
            slf.grow_exact(increment);
        }
        if self.capacity - self.len < additional {
            do_reserve(self, additional);
        }
    }
    /// 增加increment多的容量
    fn grow_exact(&mut self, increment: NonZeroUsize) {
        let new_capacity = self
            .capacity
            .checked_add(increment.get())
            .expect("capacity overflow");
        let new_layout = array_layout(&self.item_layout, new_capacity)
            .expect("array layout should be valid");
        let new_data = if self.capacity == 0 {
            // SAFETY: layout has non-zero size as per safety requirement
            unsafe { std::alloc::alloc(new_layout) }
        } else {
            // SAFETY:
            // - ptr was allocated via this allocator
            // - the layout of the ptr was `array_layout(self.item_layout, self.capacity)`
            // - `item_layout.size() > 0` and `new_capacity > 0`, so the layout size is non-zero
            unsafe {
                std::alloc::realloc(
                    self.data.as_ptr(),
                    array_layout(&self.item_layout, self.capacity)
                        .expect("array layout should be valid"),
                    new_layout.size(),
                )
            }
        };

        self.data = NonNull::new(new_data)
            .unwrap_or_else(|| handle_alloc_error(new_layout));
        self.capacity = new_capacity;
    }

    /// 初始化对应下标的值 (`push_bytes`/写入未初始化行)
    ///
    /// # Note
    /// - 注意index应该在 非剩余容量的空间 内
    /// - @`value` 应该指向被擦出类型前的类型
    #[inline]
    pub unsafe fn initialize_unchecked(
        &mut self,
        index: usize,
        value: OwningPtr<'_>,
    ) {
        debug_assert!(index < self.len());
        let ptr = self.get_unchecked(index);
        std::ptr::copy_nonoverlapping::<u8>(
            value.as_ptr(),
            ptr.as_ptr(),
            self.item_layout.size(),
        );
    }

    /// 将 `index` 位置的值替换为 `value`
    ///
    /// # Safety
    /// - `index` 必须在有效范围内
    /// - `index` 处原本的值必须已经初始化过，且与此 [`BlobVec`] 的 `item_layout` 匹配
    /// - `*value` 所指向的内存也必须已初始化为一个与此 [`BlobVec`] 的 `item_layout` 匹配的项
    pub unsafe fn replace_unchecked(
        &mut self,
        index: usize,
        value: OwningPtr<'_>,
    ) {
        debug_assert!(index < self.len());

        // SAFETY: The caller ensures that `index` fits in this vector.
        let destination =
            NonNull::from(unsafe { self.get_unchecked_mut(index) });
        let source = value.as_ptr();

        if let Some(drop) = self.drop {
            // 临时将长度设置为0，这样如果`drop`发生panic，
            // 调用者不会因为`BlobVec`中有一个已被释放的元素在其初始化范围内而陷入困境
            let old_len = self.len;
            self.len = 0;

            // SAFETY:
            // - `destination`是从该vec中的`PtrMut`获取的，这确保它是非空的，对底层类型对齐
            // - 存储位置稍后将被`value`覆盖，这确保了元素不会被观察到或重复释放
            let old_value = unsafe { OwningPtr::new(destination) };

            // 这个闭包将在`drop()`发生panic时运行，确保`value`不会被忘记
            let on_unwind = OnDrop::new(|| drop(value));

            drop(old_value);

            // 如果上面的代码没有panic，确保`value`不会被释放
            core::mem::forget(on_unwind);

            self.len = old_len;
        }

        // SAFETY: `source`和`destination`来自不同内存位置，互不重叠
        unsafe {
            std::ptr::copy_nonoverlapping::<u8>(
                source,
                destination.as_ptr(),
                self.item_layout.size(),
            );
        }
    }

    /// 向尾部添加一个值 (`push_bytes`)
    #[inline]
    pub unsafe fn push(&mut self, value: OwningPtr<'_>) {
        self.reserve(1);
        let index = self.len;
        self.len += 1;
        self.initialize_unchecked(index, value);
    }

    /// 弹出最后一行，拷贝进 `dst` (`pop_bytes`)
    ///
    /// # Safety
    /// `dst` 必须指向一块与 `item_layout` 大小、对齐一致且可写的内存
    #[inline]
    pub unsafe fn pop_bytes(&mut self, dst: PtrMut<'_>) {
        debug_assert!(self.len > 0);
        let last = self.len - 1;
        let size = self.item_layout.size();
        let src = unsafe { self.get_ptr_mut().byte_add(last * size) };
        unsafe {
            std::ptr::copy_nonoverlapping::<u8>(
                src.as_ptr(),
                dst.as_ptr(),
                size,
            );
        }
        self.len = last;
    }

    #[inline]
    pub unsafe fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.capacity());
        self.len = len;
    }

    /// `bytes_at(i)`: 返回第 `i` 行的只读指针. 前提: `i < capacity`
    #[inline]
    pub unsafe fn get_unchecked(&self, index: usize) -> Ptr<'_> {
        debug_assert!(index < self.len());
        let size = self.item_layout.size();
        unsafe { self.get_ptr().byte_add(index * size) }
    }

    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> PtrMut<'_> {
        debug_assert!(index < self.len());
        let size = self.item_layout.size();
        unsafe { self.get_ptr_mut().byte_add(index * size) }
    }

    /// 在 `index` 处执行字节级交换移除，并返回移除行的所有权，调用方负责释放
    ///
    /// # Safety
    /// `index` 必须 `< self.len()`
    #[inline]
    #[must_use = "The returned pointer should be used to dropped the removed element"]
    pub unsafe fn swap_remove_and_forget_unchecked(
        &mut self,
        index: usize,
    ) -> OwningPtr<'_> {
        debug_assert!(index < self.len());
        let new_len = self.len - 1;
        let size = self.item_layout.size();
        if index != new_len {
            std::ptr::swap_nonoverlapping::<u8>(
                self.get_unchecked_mut(index).as_ptr(),
                self.get_unchecked_mut(new_len).as_ptr(),
                size,
            );
        }
        self.len = new_len;
        // SAFETY: `new_len` fits in this vector's allocation and the removed
        // element lives as long as this vector's mutable reference.
        let p = unsafe { self.get_ptr_mut().byte_add(new_len * size) };
        unsafe { p.promote() }
    }

    /// 移除 `index` 处的值并将存储的值复制到 `ptr` 中 (`swap_remove` into a caller buffer)
    ///
    /// # Safety
    /// `index` 必须 `< self.len()` 且 `self[index]` 已经正确初始化
    #[inline]
    pub unsafe fn swap_remove_unchecked(
        &mut self,
        index: usize,
        ptr: PtrMut<'_>,
    ) {
        debug_assert!(index < self.len());
        let last = self.get_unchecked_mut(self.len - 1).as_ptr();
        let target = self.get_unchecked_mut(index).as_ptr();
        std::ptr::copy_nonoverlapping::<u8>(
            target,
            ptr.as_ptr(),
            self.item_layout.size(),
        );
        // 被移除的行可能就是最后一行，不能使用 copy_nonoverlapping
        std::ptr::copy::<u8>(last, target, self.item_layout.size());
        self.len -= 1;
    }

    /// 移除 `index` 处的值并将其drop. 不进行边界检查. 由最后一个元素补位.
    ///
    /// # Safety
    /// `index` 必须 `< self.len()`
    #[inline]
    pub unsafe fn swap_remove_and_drop_unchecked(&mut self, index: usize) {
        debug_assert!(index < self.len());
        let drop = self.drop;
        let value = self.swap_remove_and_forget_unchecked(index);
        if let Some(drop) = drop {
            drop(value);
        }
    }

    /// 字节级交换 `i` 与 `j` 两行，借助栈上临时缓冲区避免堆分配
    ///
    /// # Safety
    /// `i` 与 `j` 都必须 `< self.len()`
    pub unsafe fn swap(&mut self, i: usize, j: usize) {
        debug_assert!(i < self.len());
        debug_assert!(j < self.len());
        if i == j {
            return;
        }
        let size = self.item_layout.size();
        if size == 0 {
            return;
        }
        // 栈缓冲区上限：任意单行的临时拷贝空间。组件行超过这个尺寸时退化为直接交换。
        const STACK_BUF: usize = 256;
        let a = unsafe { self.get_unchecked_mut(i).as_ptr() };
        let b = unsafe { self.get_unchecked_mut(j).as_ptr() };
        if size <= STACK_BUF {
            let mut buf = [0u8; STACK_BUF];
            unsafe {
                std::ptr::copy_nonoverlapping(a, buf.as_mut_ptr(), size);
                std::ptr::copy_nonoverlapping(b, a, size);
                std::ptr::copy_nonoverlapping(buf.as_ptr(), b, size);
            }
        } else {
            unsafe { std::ptr::swap_nonoverlapping(a, b, size) };
        }
    }

    /// 获取指向 vec 起始位置的 [`Ptr`]
    #[inline]
    pub fn get_ptr(&self) -> Ptr<'_> {
        // SAFETY: the inner data will remain valid for as long as 'self.
        unsafe { Ptr::new(self.data) }
    }

    /// 获取指向 vec 起始位置的 [`PtrMut`]
    #[inline]
    pub fn get_ptr_mut(&mut self) -> PtrMut<'_> {
        // SAFETY: the inner data will remain valid for as long as 'self.
        unsafe { PtrMut::new(self.data) }
    }

    /// 获取 非剩余容量空间 的切片
    pub unsafe fn get_slice<T>(&self) -> &[UnsafeCell<T>] {
        unsafe {
            std::slice::from_raw_parts(
                self.data.as_ptr() as *const UnsafeCell<T>,
                self.len,
            )
        }
    }

    /// 释放所有元素数据,但容量不变
    pub fn clear(&mut self) {
        let len = self.len;
        self.len = 0;
        if let Some(drop) = self.drop {
            let size = self.item_layout.size();
            for i in 0..len {
                let item =
                    unsafe { self.get_ptr_mut().byte_add(i * size).promote() };
                unsafe { drop(item) };
            }
        }
    }
}

impl std::fmt::Debug for BlobVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobVec")
            .field("item_layout", &self.item_layout)
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .field("data", &self.data)
            .finish()
    }
}

impl Drop for BlobVec {
    fn drop(&mut self) {
        self.clear();
        let array_layout = array_layout(&self.item_layout, self.capacity)
            .expect("array layout should be valid");
        if array_layout.size() > 0 {
            unsafe {
                std::alloc::dealloc(self.get_ptr_mut().as_ptr(), array_layout);
            }
        }
    }
}

/// layout = Layout::new::\<T\>()\
/// 创建一个布局，描述 `[T; n]` 的记录。
fn array_layout(layout: &Layout, n: usize) -> Option<Layout> {
    let (array_layout, offset) = repeat_layout(layout, n)?;
    debug_assert_eq!(layout.size(), offset);
    Some(array_layout)
}

/// 创建一个布局，以描述 `layout` 的 `n` 实例的记录，并在每个实例之间使用适当的填充量
fn repeat_layout(layout: &Layout, n: usize) -> Option<(Layout, usize)> {
    let padded_size =
        layout.size() + padding_needed_for(layout, layout.align());
    let alloc_size = padded_size.checked_mul(n)?;

    // SAFETY: align 有效，alloc_size 已被填充对齐
    unsafe {
        Some((
            Layout::from_size_align_unchecked(alloc_size, layout.align()),
            padded_size,
        ))
    }
}

/// 返回必须在 `layout` 之后插入的填充量，以确保以下地址满足 `align` (以字节为单位)
pub const fn padding_needed_for(layout: &Layout, align: usize) -> usize {
    let len = layout.size();
    let len_rounded_up =
        len.wrapping_add(align).wrapping_sub(1) & !align.wrapping_sub(1);
    len_rounded_up.wrapping_sub(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::Layout;

    unsafe fn drop_i32(ptr: OwningPtr<'_>) {
        ptr.drop_as::<i32>();
    }

    fn new_i32_vec(capacity: usize) -> BlobVec {
        unsafe { BlobVec::new(Layout::new::<i32>(), Some(drop_i32), capacity) }
    }

    unsafe fn push_i32(vec: &mut BlobVec, value: i32) {
        OwningPtr::make(value, |ptr| unsafe { vec.push(ptr) });
    }

    unsafe fn read_i32(vec: &BlobVec, index: usize) -> i32 {
        *vec.get_unchecked(index).deref::<i32>()
    }

    #[test]
    fn push_and_read() {
        let mut vec = new_i32_vec(4);
        unsafe {
            push_i32(&mut vec, 1);
            push_i32(&mut vec, 2);
            push_i32(&mut vec, 3);
        }
        assert_eq!(vec.len(), 3);
        unsafe {
            assert_eq!(read_i32(&vec, 0), 1);
            assert_eq!(read_i32(&vec, 1), 2);
            assert_eq!(read_i32(&vec, 2), 3);
        }
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut vec = new_i32_vec(2);
        for i in 0..10 {
            unsafe { push_i32(&mut vec, i) };
        }
        assert_eq!(vec.len(), 10);
        assert!(vec.capacity() >= 10);
        for i in 0..10 {
            unsafe { assert_eq!(read_i32(&vec, i as usize), i) };
        }
    }

    #[test]
    fn swap_remove_moves_tail_into_hole() {
        let mut vec = new_i32_vec(4);
        unsafe {
            push_i32(&mut vec, 10);
            push_i32(&mut vec, 20);
            push_i32(&mut vec, 30);
        }
        unsafe { vec.swap_remove_and_drop_unchecked(0) };
        assert_eq!(vec.len(), 2);
        unsafe {
            assert_eq!(read_i32(&vec, 0), 30);
            assert_eq!(read_i32(&vec, 1), 20);
        }
    }

    #[test]
    fn swap_exchanges_two_rows() {
        let mut vec = new_i32_vec(4);
        unsafe {
            push_i32(&mut vec, 1);
            push_i32(&mut vec, 2);
            vec.swap(0, 1);
        }
        unsafe {
            assert_eq!(read_i32(&vec, 0), 2);
            assert_eq!(read_i32(&vec, 1), 1);
        }
    }

    #[test]
    fn zst_tracks_len_without_allocating() {
        let mut vec = unsafe { BlobVec::new(Layout::new::<()>(), None, 0) };
        assert_eq!(vec.capacity(), usize::MAX);
        for _ in 0..5 {
            unsafe { OwningPtr::make((), |ptr| vec.push(ptr)) };
        }
        assert_eq!(vec.len(), 5);
    }
}
